// SPDX-License-Identifier: AGPL-3.0-only

//! Network parameters

use crate::error::{ModelError, Result};
use nnacc_driver::{ActivationTable, Fixed, Topology};

/// One fully-connected layer in Q4.11.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseLayer {
    inputs: usize,
    outputs: usize,
    /// Row-major `[outputs][inputs]`.
    weights: Vec<Fixed>,
    biases: Vec<Fixed>,
}

impl DenseLayer {
    /// # Errors
    ///
    /// Returns error if the parameter counts do not match `inputs × outputs`.
    pub fn new(inputs: usize, outputs: usize, weights: Vec<Fixed>, biases: Vec<Fixed>) -> Result<Self> {
        if weights.len() != inputs * outputs {
            return Err(ModelError::shape_mismatch(format!(
                "{inputs}→{outputs} layer needs {} weights, got {}",
                inputs * outputs,
                weights.len()
            )));
        }
        if biases.len() != outputs {
            return Err(ModelError::shape_mismatch(format!(
                "{inputs}→{outputs} layer needs {outputs} biases, got {}",
                biases.len()
            )));
        }
        Ok(Self {
            inputs,
            outputs,
            weights,
            biases,
        })
    }

    /// Layer from float parameters, rounded and saturated to Q4.11.
    ///
    /// # Errors
    ///
    /// Returns error on a shape mismatch.
    pub fn from_f32(inputs: usize, outputs: usize, weights: &[f32], biases: &[f32]) -> Result<Self> {
        Self::new(
            inputs,
            outputs,
            weights.iter().copied().map(Fixed::from_f32).collect(),
            biases.iter().copied().map(Fixed::from_f32).collect(),
        )
    }

    /// Fan-in.
    pub const fn inputs(&self) -> usize {
        self.inputs
    }

    /// Fan-out.
    pub const fn outputs(&self) -> usize {
        self.outputs
    }

    /// Weights of output neuron `neuron`.
    pub fn row(&self, neuron: usize) -> &[Fixed] {
        &self.weights[neuron * self.inputs..(neuron + 1) * self.inputs]
    }

    /// All weights, row-major.
    pub fn weights(&self) -> &[Fixed] {
        &self.weights
    }

    /// Biases.
    pub fn biases(&self) -> &[Fixed] {
        &self.biases
    }
}

/// A complete network: chained layers plus an optional custom activation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkModel {
    topology: Topology,
    layers: Vec<DenseLayer>,
    table: Option<ActivationTable>,
}

impl NetworkModel {
    /// # Errors
    ///
    /// Returns error if the layers do not chain or the depth is unsupported.
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self> {
        let Some(first) = layers.first() else {
            return Err(ModelError::shape_mismatch("model has no layers"));
        };
        let mut sizes = vec![first.inputs];
        for (i, layer) in layers.iter().enumerate() {
            if layer.inputs != sizes[i] {
                return Err(ModelError::shape_mismatch(format!(
                    "layer {i} expects {} inputs, previous layer produces {}",
                    layer.inputs, sizes[i]
                )));
            }
            sizes.push(layer.outputs);
        }
        let topology = Topology::new(&sizes)?;
        Ok(Self {
            topology,
            layers,
            table: None,
        })
    }

    /// Use a custom activation table instead of the built-in sigmoid.
    #[must_use]
    pub fn with_table(mut self, table: ActivationTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Layer sizes.
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Computed layers, first hidden layer first.
    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Custom activation table, if one was loaded.
    pub const fn custom_table(&self) -> Option<&ActivationTable> {
        self.table.as_ref()
    }

    /// Table the accelerator should hold for this model.
    pub fn activation_table(&self) -> ActivationTable {
        self.table.clone().unwrap_or_default()
    }

    /// Total parameter count.
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.biases.len())
            .sum()
    }
}
