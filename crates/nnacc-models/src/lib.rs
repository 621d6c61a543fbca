// SPDX-License-Identifier: AGPL-3.0-only

#![deny(unsafe_code)]

//! Model files and parameter streaming for the nnacc accelerator
//!
//! Loads exported networks (`.mem` weights and biases plus a C config
//! header), turns an input vector and the parameters into the beat stream
//! the accelerator consumes, and runs it on any [`nnacc_driver::InferenceBackend`].
//!
//! # Example
//!
//! ```no_run
//! use nnacc_driver::{AcceleratorConfig, select_backend, BackendSelection};
//! use nnacc_models::{read_mem, NetworkModel};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = NetworkModel::from_dir("model/")?;
//! let input = read_mem(Path::new("digit7.mem"))?;
//!
//! let mut backend = select_backend(BackendSelection::Cycle, AcceleratorConfig::default())?;
//! let p = model.infer(backend.as_mut(), &input)?;
//! println!("class {} ({:.1}%)", p.class, p.confidence * 100.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod error;
mod inference;
pub mod loading;
pub mod memfile;
mod model;
mod program;

pub use error::{ModelError, Result};
pub use inference::Prediction;
pub use loading::ModelConfig;
pub use memfile::{format_mem, parse_mem, read_mem, write_mem};
pub use model::{DenseLayer, NetworkModel};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{DenseLayer, ModelError, NetworkModel, Prediction, Result};
}
