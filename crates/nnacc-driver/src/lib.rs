// SPDX-License-Identifier: AGPL-3.0-only

//! Cycle-accurate model and host driver for the nnacc MLP accelerator.
//!
//! The accelerator evaluates a fully-connected network of up to four layers
//! in Q4.11 fixed point. Parameters arrive on a streaming input port in the
//! order the sequencer consumes them; results leave on a streaming output
//! port; a small register file controls the run.
//!
//! # Structure
//!
//! ```text
//!   NnDriver ──► Accelerator ── RegisterFile (CTRL / STATUS / sizes)
//!                    │
//!                    └─► LayerSequencer ──► ComputeLane × NUM_PARALLEL
//!                             ▲   │                 │
//!                   BeatQueue ┘   └► BeatCollector  └► ActivationTable
//! ```
//!
//! # Quick start
//!
//! ```
//! use nnacc_driver::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let topology = Topology::new(&[2, 1])?;
//! let mut backend = CycleBackend::new(AcceleratorConfig::default())?;
//!
//! // input, bias, one weight vector
//! let values: Vec<Fixed> = [0.0, 1.0, 0.5, 0.0, 2.0].iter().map(|&v| Fixed::from_f32(v)).collect();
//! let outputs = backend.infer(&topology, &packetize(&values))?;
//!
//! assert_eq!(outputs.len(), 1);
//! println!("{} after {:?} cycles", outputs[0], backend.last_cycles());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]

pub mod activation;
mod backend;
pub mod backends;
mod device;
mod error;
pub mod fixed;
mod inference;
pub mod lane;
pub mod mmio;
pub mod sequencer;
pub mod stream;
mod topology;

/// Register map (re-exported from nnacc-chip).
pub mod regs {
    pub use nnacc_chip::regs::*;
}

pub use activation::ActivationTable;
pub use backend::{
    select_backend, select_backend_with_table, BackendSelection, BackendType, InferenceBackend,
};
pub use backends::{CycleBackend, SoftwareBackend};
pub use device::Accelerator;
pub use error::{NnError, Result};
pub use fixed::{Accumulator, Fixed};
pub use inference::{
    classify, confidence, estimate_cycles, InferenceConfig, InferenceResult, NnDriver,
    RESET_HOLD_CYCLES,
};
pub use lane::{ComputeLane, LaneCommand, LaneState};
pub use mmio::{RegisterFile, Status};
pub use sequencer::{AcceleratorConfig, ControlInputs, LayerSequencer, RunStats, SequencerState};
pub use stream::{packetize, Beat, BeatCollector, BeatQueue, BeatSink, BeatSource};
pub use topology::Topology;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        packetize, select_backend, AcceleratorConfig, Accelerator, ActivationTable, Beat,
        BackendSelection, CycleBackend, Fixed, InferenceBackend, InferenceResult, NnDriver,
        NnError, Result, SoftwareBackend, Topology,
    };
}
