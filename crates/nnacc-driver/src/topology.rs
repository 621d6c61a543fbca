// SPDX-License-Identifier: AGPL-3.0-only

//! Network topology: the ordered layer sizes of one inference run

use crate::error::{NnError, Result};
use nnacc_chip::topology::{LayerDims, MAX_LAYERS, MIN_LAYERS};

/// Layer sizes, input layer first.
///
/// Layer 0 is the input vector; layers `1..` are computed. Sizes are
/// positive; the upper bound depends on the accelerator's buffer width and
/// is checked by [`crate::AcceleratorConfig::check_topology`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    sizes: Vec<usize>,
}

impl Topology {
    /// Build a topology from layer sizes.
    ///
    /// # Errors
    ///
    /// Returns error if there are fewer than 2 or more than 4 layers, or
    /// any layer is empty.
    pub fn new(sizes: &[usize]) -> Result<Self> {
        if !(MIN_LAYERS..=MAX_LAYERS).contains(&sizes.len()) {
            return Err(NnError::invalid_config(format!(
                "{} layers given, expected {MIN_LAYERS}..={MAX_LAYERS}",
                sizes.len()
            )));
        }
        if let Some(layer) = sizes.iter().position(|&s| s == 0) {
            return Err(NnError::invalid_config(format!("layer {layer} has size 0")));
        }
        Ok(Self {
            sizes: sizes.to_vec(),
        })
    }

    /// 784 → 16 → 16 → 10.
    pub fn mnist() -> Self {
        Self::from(LayerDims::MNIST)
    }

    /// All layer sizes.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Size of `layer` (0 = input).
    pub fn size(&self, layer: usize) -> usize {
        self.sizes[layer]
    }

    /// Number of layers including the input layer.
    pub fn layer_count(&self) -> usize {
        self.sizes.len()
    }

    /// Index of the output layer.
    pub fn last_layer(&self) -> usize {
        self.sizes.len() - 1
    }

    /// Input vector length.
    pub fn input_size(&self) -> usize {
        self.sizes[0]
    }

    /// Output vector length.
    pub fn output_size(&self) -> usize {
        self.sizes[self.last_layer()]
    }

    /// Widest layer.
    pub fn widest(&self) -> usize {
        self.sizes.iter().copied().max().unwrap_or(0)
    }

    /// Lane groups needed for computed `layer` with `num_parallel` lanes.
    pub fn group_count(&self, layer: usize, num_parallel: usize) -> usize {
        self.sizes[layer].div_ceil(num_parallel)
    }

    /// Beats the input port consumes for one full run: the input vector, then
    /// per computed layer its biases and one weight vector per lane group.
    pub fn stream_len(&self, num_parallel: usize) -> usize {
        let params: usize = (1..self.sizes.len())
            .map(|l| self.sizes[l] + self.group_count(l, num_parallel) * self.sizes[l - 1])
            .sum();
        self.input_size() + params
    }
}

impl From<LayerDims> for Topology {
    fn from(dims: LayerDims) -> Self {
        Self {
            sizes: dims.as_array().iter().map(|&s| usize::from(s)).collect(),
        }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.sizes.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("→"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_shapes() {
        assert!(Topology::new(&[4]).is_err());
        assert!(Topology::new(&[4, 3, 2, 1, 1]).is_err());
        assert!(Topology::new(&[4, 0, 2]).is_err());
        assert!(Topology::new(&[2, 2, 1]).is_ok());
    }

    #[test]
    fn mnist_shape() {
        let t = Topology::mnist();
        assert_eq!(t.sizes(), &[784, 16, 16, 10]);
        assert_eq!(t.last_layer(), 3);
        assert_eq!(t.output_size(), 10);
        assert_eq!(t.to_string(), "784→16→16→10");
    }

    #[test]
    fn stream_length_counts_per_group_weights() {
        let t = Topology::new(&[2, 3]).unwrap();
        // 2 inputs + 3 biases + 2 groups × 2 weights
        assert_eq!(t.group_count(1, 2), 2);
        assert_eq!(t.stream_len(2), 2 + 3 + 4);
        let m = Topology::mnist();
        assert_eq!(m.stream_len(4), 784 + (16 + 4 * 784) + (16 + 4 * 16) + (10 + 3 * 16));
    }
}
