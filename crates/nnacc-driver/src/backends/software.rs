// SPDX-License-Identifier: AGPL-3.0-only

//! Software (functional) backend
//!
//! Computes each neuron in one call instead of ticking the lanes, but walks
//! the beat stream with exactly the sequencer's termination rules and keeps
//! the same four buffers between runs. The result is bit-identical to the
//! cycle backend, including:
//!
//! - the bias load at input index 0, so `input[0]` never contributes;
//! - the single weight vector per lane group, shared by every lane;
//! - the early-`last` input truncation, which leaves stale input slots.
//!
//! That makes it the oracle for the cycle-accurate model and a fast path
//! for evaluating whole data sets.

use crate::activation::ActivationTable;
use crate::backend::{BackendType, InferenceBackend};
use crate::error::{NnError, Result};
use crate::fixed::{accumulate, finalize, load_bias, multiply, Fixed};
use crate::sequencer::AcceleratorConfig;
use crate::stream::Beat;
use crate::topology::Topology;
use tracing::{debug, warn};

/// Functional model of the accelerator.
#[derive(Debug, Clone)]
pub struct SoftwareBackend {
    config: AcceleratorConfig,
    table: ActivationTable,
    input_buf: Vec<Fixed>,
    output_buf: Vec<Fixed>,
    bias_buf: Vec<Fixed>,
    weight_buf: Vec<Fixed>,
}

impl SoftwareBackend {
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(config: AcceleratorConfig) -> Result<Self> {
        Self::with_table(config, ActivationTable::sigmoid())
    }

    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn with_table(config: AcceleratorConfig, table: ActivationTable) -> Result<Self> {
        config.validate()?;
        let width = config.max_width;
        Ok(Self {
            config,
            table,
            input_buf: vec![Fixed::ZERO; width],
            output_buf: vec![Fixed::ZERO; width],
            bias_buf: vec![Fixed::ZERO; width],
            weight_buf: vec![Fixed::ZERO; width],
        })
    }

    /// One neuron: bias, then inputs 1.. against the group's weight vector.
    fn neuron(&self, bias: Fixed, width: usize) -> Fixed {
        let acc = (1..width).fold(load_bias(bias), |acc, j| {
            accumulate(acc, multiply(self.input_buf[j], self.weight_buf[j]))
        });
        let pre = finalize(acc);
        if self.config.activation {
            self.table.lookup(pre)
        } else {
            pre
        }
    }

    fn run_layer(
        &mut self,
        layer: usize,
        topology: &Topology,
        beats: &mut impl Iterator<Item = Beat>,
    ) -> Result<()> {
        let cur = topology.size(layer);
        let prev = topology.size(layer - 1);
        let lanes = self.config.num_parallel;

        for n in 0..cur {
            self.bias_buf[n] = next_data(beats, "biases", layer)?;
        }
        for base in (0..cur).step_by(lanes) {
            for j in 0..prev {
                self.weight_buf[j] = next_data(beats, "weights", layer)?;
            }
            for idx in base..(base + lanes).min(cur) {
                let value = self.neuron(self.bias_buf[idx], prev);
                self.output_buf[idx] = value;
            }
        }
        self.input_buf.copy_from_slice(&self.output_buf);
        Ok(())
    }
}

fn next_data(beats: &mut impl Iterator<Item = Beat>, what: &str, layer: usize) -> Result<Fixed> {
    beats
        .next()
        .map(|b| b.data)
        .ok_or_else(|| NnError::stream_mismatch(format!("stream ended in layer {layer} {what}")))
}

impl InferenceBackend for SoftwareBackend {
    fn infer(&mut self, topology: &Topology, stream: &[Beat]) -> Result<Vec<Fixed>> {
        self.config.check_topology(topology)?;
        let mut beats = stream.iter().copied();

        let size = topology.input_size();
        for idx in 0..size {
            let beat = beats
                .next()
                .ok_or_else(|| NnError::stream_mismatch("stream ended in input"))?;
            self.input_buf[idx] = beat.data;
            if beat.last {
                if idx + 1 < size {
                    warn!("input stream ended after {} of {size} elements", idx + 1);
                }
                break;
            }
        }

        for layer in 1..topology.layer_count() {
            self.run_layer(layer, topology, &mut beats)?;
        }

        let leftover = beats.count();
        if leftover > 0 {
            warn!("{leftover} input beats left unconsumed");
        }
        debug!("SoftwareBackend: {topology} done");
        Ok(self.output_buf[..topology.output_size()].to_vec())
    }

    fn config(&self) -> &AcceleratorConfig {
        &self.config
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::packetize;

    fn fx(v: &[f32]) -> Vec<Fixed> {
        v.iter().map(|&x| Fixed::from_f32(x)).collect()
    }

    fn linear(lanes: usize) -> SoftwareBackend {
        SoftwareBackend::new(
            AcceleratorConfig::default()
                .with_num_parallel(lanes)
                .with_activation(false),
        )
        .unwrap()
    }

    #[test]
    fn input_zero_never_contributes() {
        let mut b = linear(1);
        let t = Topology::new(&[3, 1]).unwrap();
        let with = b.infer(&t, &packetize(&fx(&[9.0, 1.0, 1.0, 0.0, 5.0, 1.0, 1.0]))).unwrap();
        let without = b.infer(&t, &packetize(&fx(&[0.0, 1.0, 1.0, 0.0, 5.0, 1.0, 1.0]))).unwrap();
        assert_eq!(with, without);
        assert_eq!(with, fx(&[2.0]));
    }

    #[test]
    fn group_shares_first_neuron_weights() {
        let mut b = linear(4);
        let t = Topology::new(&[2, 4]).unwrap();
        let stream = fx(&[0.0, 1.0, 0.0, 0.5, 1.0, 1.5, 0.0, 2.0]);
        let out = b.infer(&t, &packetize(&stream)).unwrap();
        assert_eq!(out, fx(&[2.0, 2.5, 3.0, 3.5]));
    }

    #[test]
    fn short_stream_is_an_error() {
        let mut b = linear(2);
        let t = Topology::new(&[2, 2]).unwrap();
        let err = b.infer(&t, &packetize(&fx(&[1.0, 1.0, 0.0]))).unwrap_err();
        assert!(matches!(err, NnError::StreamMismatch { .. }));
    }

    #[test]
    fn oversize_topology_rejected() {
        let mut b = SoftwareBackend::new(AcceleratorConfig::default().with_max_width(4)).unwrap();
        let t = Topology::new(&[5, 1]).unwrap();
        assert!(matches!(b.infer(&t, &[]), Err(NnError::InvalidConfig { .. })));
    }

    #[test]
    fn applies_table_on_every_layer() {
        let mut b = SoftwareBackend::new(AcceleratorConfig::default().with_num_parallel(1)).unwrap();
        let t = Topology::new(&[1, 1, 1]).unwrap();
        let out = b.infer(&t, &packetize(&fx(&[1.0, 0.0, 1.0, 0.0, 1.0]))).unwrap();
        let table = ActivationTable::sigmoid();
        // hidden = sigmoid(0); output = sigmoid(0) again since in[0] is skipped
        assert_eq!(out, vec![table.lookup(Fixed::ZERO)]);
        assert_eq!(b.backend_type(), BackendType::Software);
        assert!(b.is_ready());
    }
}
