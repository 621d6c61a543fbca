// SPDX-License-Identifier: AGPL-3.0-only

//! Inference backend implementations
//!
//! - **Cycle**: drives the simulated device through the host driver
//! - **Software**: functional model used as a parity oracle

pub mod cycle;
pub mod software;

pub use cycle::CycleBackend;
pub use software::SoftwareBackend;
