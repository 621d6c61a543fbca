// SPDX-License-Identifier: AGPL-3.0-only

//! Cycle-accurate backend
//!
//! Programs the topology through the register file, queues the stream and
//! ticks the device until it signals completion.

use crate::activation::ActivationTable;
use crate::backend::{BackendType, InferenceBackend};
use crate::device::Accelerator;
use crate::error::Result;
use crate::fixed::Fixed;
use crate::inference::NnDriver;
use crate::sequencer::AcceleratorConfig;
use crate::stream::Beat;
use crate::topology::Topology;
use tracing::debug;

/// Backend over [`NnDriver`] and a simulated [`Accelerator`].
#[derive(Debug)]
pub struct CycleBackend {
    driver: NnDriver,
    initialized: bool,
    last_cycles: Option<u64>,
}

impl CycleBackend {
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(config: AcceleratorConfig) -> Result<Self> {
        Self::with_table(config, ActivationTable::sigmoid())
    }

    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn with_table(config: AcceleratorConfig, table: ActivationTable) -> Result<Self> {
        Ok(Self::from_driver(NnDriver::new(Accelerator::with_table(config, table)?)))
    }

    /// Use a prepared driver, e.g. one whose device stalls its ports.
    pub fn from_driver(driver: NnDriver) -> Self {
        Self {
            driver,
            initialized: false,
            last_cycles: None,
        }
    }

    /// The driver.
    pub const fn driver(&self) -> &NnDriver {
        &self.driver
    }
}

impl InferenceBackend for CycleBackend {
    fn infer(&mut self, topology: &Topology, stream: &[Beat]) -> Result<Vec<Fixed>> {
        if !self.initialized || self.driver.device().sequencer().topology() != topology {
            debug!("CycleBackend: programming {topology}");
            self.driver.init(topology)?;
            self.initialized = true;
        }
        self.last_cycles = None;
        let result = self.driver.run_inference(stream, topology.output_size())?;
        self.last_cycles = Some(result.cycles);
        Ok(result.outputs)
    }

    fn config(&self) -> &AcceleratorConfig {
        self.driver.device().config()
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Cycle
    }

    fn is_ready(&self) -> bool {
        !self.driver.is_busy()
    }

    fn last_cycles(&self) -> Option<u64> {
        self.last_cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::packetize;

    #[test]
    fn reprograms_on_topology_change() {
        let mut b = CycleBackend::new(AcceleratorConfig::default().with_num_parallel(2)).unwrap();
        let one = Fixed::ONE;
        let a = Topology::new(&[1, 1]).unwrap();
        let out = b.infer(&a, &packetize(&[one, one, one])).unwrap();
        assert_eq!(out.len(), 1);
        assert!(b.last_cycles().is_some());

        let wide = Topology::new(&[1, 3]).unwrap();
        let stream = packetize(&[one, one, one, one, one, one]);
        let out = b.infer(&wide, &stream).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(b.driver().device().sequencer().topology(), &wide);
        assert!(b.is_ready());
        assert_eq!(b.backend_type(), BackendType::Cycle);
    }
}
