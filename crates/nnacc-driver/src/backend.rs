// SPDX-License-Identifier: AGPL-3.0-only

//! Backend abstraction for running a beat stream through the accelerator
//!
//! Both backends consume the same stream and must agree bit for bit; the
//! cycle backend additionally reports how long the run took.

use crate::activation::ActivationTable;
use crate::error::Result;
use crate::fixed::Fixed;
use crate::sequencer::AcceleratorConfig;
use crate::stream::Beat;
use crate::topology::Topology;
use std::fmt::Debug;

/// Inference backend trait
pub trait InferenceBackend: Debug + Send {
    /// Run one inference over a prepared beat stream.
    ///
    /// # Errors
    ///
    /// Returns error if the topology does not fit, the stream runs dry, or
    /// the run times out.
    fn infer(&mut self, topology: &Topology, stream: &[Beat]) -> Result<Vec<Fixed>>;

    /// Build-time parameters of the modelled accelerator.
    fn config(&self) -> &AcceleratorConfig;

    /// Get backend type for debugging
    fn backend_type(&self) -> BackendType;

    /// Check if backend is ready
    fn is_ready(&self) -> bool;

    /// Cycles taken by the last run, where the backend models time.
    fn last_cycles(&self) -> Option<u64> {
        None
    }
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Tick-by-tick model of the sequencer and lanes behind the register file
    Cycle,

    /// Collapsed functional model, one call per neuron
    Software,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle => write!(f, "Cycle-accurate"),
            Self::Software => write!(f, "Software (functional)"),
        }
    }
}

/// Backend selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendSelection {
    /// Cycle-accurate unless told otherwise
    #[default]
    Auto,

    /// Force the cycle-accurate backend
    Cycle,

    /// Force the functional backend
    Software,
}

/// Select a backend with the built-in sigmoid table.
///
/// # Errors
///
/// Returns error if the configuration is invalid.
pub fn select_backend(
    selection: BackendSelection,
    config: AcceleratorConfig,
) -> Result<Box<dyn InferenceBackend>> {
    select_backend_with_table(selection, config, ActivationTable::sigmoid())
}

/// Select a backend with a custom activation table.
///
/// # Errors
///
/// Returns error if the configuration is invalid.
pub fn select_backend_with_table(
    selection: BackendSelection,
    config: AcceleratorConfig,
    table: ActivationTable,
) -> Result<Box<dyn InferenceBackend>> {
    use crate::backends::{CycleBackend, SoftwareBackend};

    match selection {
        BackendSelection::Auto | BackendSelection::Cycle => {
            tracing::info!("Using cycle-accurate backend, {} lanes", config.num_parallel);
            CycleBackend::with_table(config, table).map(|b| Box::new(b) as Box<dyn InferenceBackend>)
        }
        BackendSelection::Software => {
            tracing::info!("Using functional backend, {} lanes", config.num_parallel);
            SoftwareBackend::with_table(config, table)
                .map(|b| Box::new(b) as Box<dyn InferenceBackend>)
        }
    }
}
