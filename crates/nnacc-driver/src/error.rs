// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for accelerator configuration and host-side control

use thiserror::Error;

/// Result type alias for accelerator operations
pub type Result<T> = std::result::Result<T, NnError>;

/// Errors raised outside the tick path.
///
/// The sequencer itself never fails: overflow saturates and stream length
/// mismatches are tolerated. Everything here is rejected at configuration
/// time or reported by the host while waiting on the device.
#[derive(Debug, Error)]
pub enum NnError {
    /// Topology or accelerator configuration rejected
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for rejection
        reason: String,
    },

    /// Access to an unmapped or read-only register
    #[error("Invalid register access at offset {offset:#04x}")]
    InvalidRegister {
        /// Offending byte offset
        offset: usize,
    },

    /// Operation not allowed in the current device state
    #[error("Device in invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },

    /// Completion did not arrive within the cycle budget
    #[error("Operation timeout after {cycles} cycles")]
    Timeout {
        /// Cycles waited
        cycles: u64,
    },

    /// A beat stream does not match what the topology consumes
    #[error("Stream mismatch: {reason}")]
    StreamMismatch {
        /// Reason for failure
        reason: String,
    },
}

impl NnError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Create a stream mismatch error
    pub fn stream_mismatch(reason: impl Into<String>) -> Self {
        Self::StreamMismatch {
            reason: reason.into(),
        }
    }
}
