// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for model files and model execution

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while loading or running a model
#[derive(Debug, Error)]
pub enum ModelError {
    /// File not found or cannot be read
    #[error("Model file not found: {path}")]
    FileNotFound {
        /// Path that was attempted
        path: PathBuf,
    },

    /// Malformed `.mem` or config header content
    #[error("Failed to parse model: {reason}")]
    ParseError {
        /// Reason for failure
        reason: String,
    },

    /// Parameter counts or input length do not match the topology
    #[error("Shape mismatch: {reason}")]
    ShapeMismatch {
        /// Reason for failure
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Accelerator or backend rejected the run
    #[error("Accelerator error: {source}")]
    Driver {
        /// Underlying driver error
        #[from]
        source: nnacc_driver::NnError,
    },
}

impl ModelError {
    /// Create a parse error
    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self::ParseError {
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            reason: reason.into(),
        }
    }
}
