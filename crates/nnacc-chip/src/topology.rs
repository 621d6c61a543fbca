// SPDX-License-Identifier: AGPL-3.0-only

//! Network shape and datapath dimensions.
//!
//! The reference configuration is the MNIST classifier the block was built
//! for: 784 pixels → 16 → 16 → 10 classes, sigmoid on every layer.

/// Layer sizes of a four-layer network (input layer included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerDims {
    /// Input vector length.
    pub input: u16,
    /// First hidden layer.
    pub hidden1: u16,
    /// Second hidden layer.
    pub hidden2: u16,
    /// Output vector length.
    pub output: u16,
}

impl LayerDims {
    /// Reset values of the size registers.
    pub const MNIST: Self = Self { input: 784, hidden1: 16, hidden2: 16, output: 10 };

    /// Sizes in layer order.
    #[must_use]
    pub const fn as_array(&self) -> [u16; 4] {
        [self.input, self.hidden1, self.hidden2, self.output]
    }

    /// Weights in the full matrices (not the streamed per-group vectors).
    #[must_use]
    pub const fn weight_count(&self) -> u32 {
        self.input as u32 * self.hidden1 as u32
            + self.hidden1 as u32 * self.hidden2 as u32
            + self.hidden2 as u32 * self.output as u32
    }

    /// Biases across all computed layers.
    #[must_use]
    pub const fn bias_count(&self) -> u32 {
        self.hidden1 as u32 + self.hidden2 as u32 + self.output as u32
    }
}

/// Maximum number of layers, input layer included.
pub const MAX_LAYERS: usize = 4;

/// Minimum number of layers (input + one computed layer).
pub const MIN_LAYERS: usize = 2;

/// Width of every on-chip buffer; no layer may exceed it.
pub const MAX_LAYER_WIDTH: usize = 784;

/// Default number of compute lanes.
pub const DEFAULT_NUM_PARALLEL: usize = 4;

/// Lane cycles spent draining the MAC pipeline after the last accumulate.
pub const DRAIN_CYCLES: u8 = 2;

/// Registered read latency of the activation table.
pub const TABLE_READ_LATENCY: u8 = 1;
