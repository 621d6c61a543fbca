// SPDX-License-Identifier: AGPL-3.0-only

//! Model directories
//!
//! A trained network is exported as a directory of plain-text files:
//!
//! | File | Content |
//! |------|---------|
//! | `nn_model_config.h` | `NN_NUM_LAYERS`, `NN_FRAC_BITS`, `NN_LAYER_SIZES[]` |
//! | `nn_model_weights.mem` | every layer's weights, row-major `[out][in]` |
//! | `nn_model_biases.mem` | every layer's biases |
//! | `sigmoid_lut.mem` | optional 1024-entry activation table |

use crate::error::{ModelError, Result};
use crate::memfile::read_mem;
use crate::model::{DenseLayer, NetworkModel};
use nnacc_chip::qformat::FRAC_BITS;
use nnacc_driver::ActivationTable;
use std::path::Path;
use tracing::{debug, info};

/// Config header file name.
pub const CONFIG_FILE: &str = "nn_model_config.h";
/// Weights file name.
pub const WEIGHTS_FILE: &str = "nn_model_weights.mem";
/// Biases file name.
pub const BIASES_FILE: &str = "nn_model_biases.mem";
/// Activation table file name.
pub const TABLE_FILE: &str = "sigmoid_lut.mem";

/// Contents of `nn_model_config.h`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// `NN_NUM_LAYERS`, counting the input layer.
    pub num_layers: usize,
    /// `NN_FRAC_BITS`.
    pub frac_bits: u32,
    /// `NN_LAYER_SIZES[]`.
    pub layer_sizes: Vec<usize>,
}

impl ModelConfig {
    /// Parse the `#define`s and the size array; other lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if a required entry is missing or inconsistent.
    pub fn parse(text: &str) -> Result<Self> {
        let mut num_layers = None;
        let mut frac_bits = None;
        let mut layer_sizes = None;

        for line in text.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix("#define") {
                let mut parts = rest.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some("NN_NUM_LAYERS"), Some(v)) => num_layers = Some(parse_int(v)?),
                    (Some("NN_FRAC_BITS"), Some(v)) => frac_bits = Some(parse_int(v)?),
                    _ => {}
                }
            } else if line.contains("NN_LAYER_SIZES") {
                let body = line
                    .split_once('{')
                    .and_then(|(_, r)| r.split_once('}'))
                    .map(|(body, _)| body)
                    .ok_or_else(|| ModelError::parse_error(format!("malformed size array: {line}")))?;
                layer_sizes = Some(
                    body.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(parse_int)
                        .collect::<Result<Vec<_>>>()?,
                );
            }
        }

        let layer_sizes = layer_sizes.ok_or_else(|| ModelError::parse_error("NN_LAYER_SIZES missing"))?;
        let num_layers = num_layers.unwrap_or(layer_sizes.len());
        if num_layers != layer_sizes.len() {
            return Err(ModelError::parse_error(format!(
                "NN_NUM_LAYERS is {num_layers} but NN_LAYER_SIZES lists {}",
                layer_sizes.len()
            )));
        }
        let frac_bits = match frac_bits {
            Some(b) => u32::try_from(b).map_err(|_| ModelError::parse_error("NN_FRAC_BITS out of range"))?,
            None => FRAC_BITS,
        };
        Ok(Self {
            num_layers,
            frac_bits,
            layer_sizes,
        })
    }

    /// Render as a C header.
    pub fn to_header(&self) -> String {
        let sizes: Vec<String> = self.layer_sizes.iter().map(ToString::to_string).collect();
        format!(
            "#ifndef NN_MODEL_CONFIG_H\n#define NN_MODEL_CONFIG_H\n\n\
             #define NN_NUM_LAYERS    {}\n#define NN_FRAC_BITS     {}\n\
             #define NN_INPUT_SIZE    {}\n#define NN_OUTPUT_SIZE   {}\n\n\
             static const int NN_LAYER_SIZES[] = {{{}}};\n\n#endif\n",
            self.num_layers,
            self.frac_bits,
            self.layer_sizes.first().copied().unwrap_or(0),
            self.layer_sizes.last().copied().unwrap_or(0),
            sizes.join(", ")
        )
    }
}

fn parse_int(s: &str) -> Result<usize> {
    s.trim()
        .parse()
        .map_err(|e| ModelError::parse_error(format!("'{s}': {e}")))
}

impl NetworkModel {
    /// Load a model directory.
    ///
    /// # Errors
    ///
    /// Returns error if a required file is missing, malformed, or holds the
    /// wrong number of values for the configured layer sizes.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(ModelError::FileNotFound { path: config_path });
        }
        let config = ModelConfig::parse(&std::fs::read_to_string(&config_path)?)?;
        if config.frac_bits != FRAC_BITS {
            return Err(ModelError::parse_error(format!(
                "model uses {} fraction bits, the accelerator {FRAC_BITS}",
                config.frac_bits
            )));
        }
        debug!("model config: {:?}", config.layer_sizes);

        let weights = read_mem(&dir.join(WEIGHTS_FILE))?;
        let biases = read_mem(&dir.join(BIASES_FILE))?;
        let sizes = &config.layer_sizes;
        let expect_w: usize = sizes.windows(2).map(|p| p[0] * p[1]).sum();
        let expect_b: usize = sizes.iter().skip(1).sum();
        if weights.len() != expect_w {
            return Err(ModelError::shape_mismatch(format!(
                "{WEIGHTS_FILE} holds {} values, {sizes:?} needs {expect_w}",
                weights.len()
            )));
        }
        if biases.len() != expect_b {
            return Err(ModelError::shape_mismatch(format!(
                "{BIASES_FILE} holds {} values, {sizes:?} needs {expect_b}",
                biases.len()
            )));
        }

        let mut layers = Vec::with_capacity(sizes.len().saturating_sub(1));
        let (mut w_at, mut b_at) = (0, 0);
        for pair in sizes.windows(2) {
            let (inputs, outputs) = (pair[0], pair[1]);
            layers.push(DenseLayer::new(
                inputs,
                outputs,
                weights[w_at..w_at + inputs * outputs].to_vec(),
                biases[b_at..b_at + outputs].to_vec(),
            )?);
            w_at += inputs * outputs;
            b_at += outputs;
        }
        let mut model = Self::new(layers)?;

        let table_path = dir.join(TABLE_FILE);
        if table_path.exists() {
            model = model.with_table(ActivationTable::from_entries(read_mem(&table_path)?)?);
            debug!("custom activation table from {}", table_path.display());
        }
        info!(
            "Loaded model {} ({} parameters) from {}",
            model.topology(),
            model.parameter_count(),
            dir.display()
        );
        Ok(model)
    }
}
