// SPDX-License-Identifier: AGPL-3.0-only

//! Beat-stream builder
//!
//! Serializes one input vector and a model's parameters in the order the
//! sequencer consumes them:
//!
//! ```text
//! input[0..n0]                               (last on input[n0-1])
//! for each computed layer:
//!     bias[0..n]
//!     for each lane group g:  weight row of neuron g·P   (n_prev values)
//! ```
//!
//! The accelerator holds a single weight vector per group, so only the row
//! of the group's first neuron is sent; the other lanes of the group compute
//! with it too.

use crate::error::{ModelError, Result};
use crate::model::NetworkModel;
use nnacc_driver::{packetize, Beat, Fixed};

impl NetworkModel {
    /// Build the input stream for one run on an accelerator with
    /// `num_parallel` lanes.
    ///
    /// # Errors
    ///
    /// Returns error if `input` does not match the input layer or
    /// `num_parallel` is zero.
    pub fn stream(&self, input: &[Fixed], num_parallel: usize) -> Result<Vec<Beat>> {
        let topology = self.topology();
        if input.len() != topology.input_size() {
            return Err(ModelError::shape_mismatch(format!(
                "input has {} values, {topology} expects {}",
                input.len(),
                topology.input_size()
            )));
        }
        if num_parallel == 0 {
            return Err(ModelError::shape_mismatch("num_parallel must be at least 1"));
        }

        let mut beats = Vec::with_capacity(topology.stream_len(num_parallel));
        beats.extend(packetize(input));
        for layer in self.layers() {
            beats.extend(layer.biases().iter().copied().map(Beat::data));
            for base in (0..layer.outputs()).step_by(num_parallel) {
                beats.extend(layer.row(base).iter().copied().map(Beat::data));
            }
        }
        if let Some(end) = beats.last_mut() {
            end.last = true;
        }
        Ok(beats)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{DenseLayer, NetworkModel};
    use nnacc_driver::Fixed;

    fn raw(values: &[i16]) -> Vec<Fixed> {
        values.iter().map(|&v| Fixed::from_raw(v)).collect()
    }

    #[test]
    fn orders_biases_then_group_rows() {
        // 2 → 3 with rows 10,11 / 20,21 / 30,31 and biases 1,2,3
        let layer = DenseLayer::new(2, 3, raw(&[10, 11, 20, 21, 30, 31]), raw(&[1, 2, 3])).unwrap();
        let m = NetworkModel::new(vec![layer]).unwrap();
        let beats = m.stream(&raw(&[7, 8]), 2).unwrap();

        let data: Vec<i16> = beats.iter().map(|b| b.data.raw()).collect();
        assert_eq!(data, vec![7, 8, 1, 2, 3, 10, 11, 30, 31]);
        assert_eq!(beats.len(), m.topology().stream_len(2));

        let lasts: Vec<usize> = beats.iter().enumerate().filter(|(_, b)| b.last).map(|(i, _)| i).collect();
        assert_eq!(lasts, vec![1, 8]);
    }

    #[test]
    fn one_lane_sends_every_row() {
        let layer = DenseLayer::new(1, 2, raw(&[5, 6]), raw(&[0, 0])).unwrap();
        let m = NetworkModel::new(vec![layer]).unwrap();
        let data: Vec<i16> = m.stream(&raw(&[1]), 1).unwrap().iter().map(|b| b.data.raw()).collect();
        assert_eq!(data, vec![1, 0, 0, 5, 6]);
    }

    #[test]
    fn input_length_is_checked() {
        let layer = DenseLayer::new(2, 1, raw(&[1, 1]), raw(&[0])).unwrap();
        let m = NetworkModel::new(vec![layer]).unwrap();
        assert!(m.stream(&raw(&[1]), 4).is_err());
        assert!(m.stream(&raw(&[1, 2]), 0).is_err());
    }
}
