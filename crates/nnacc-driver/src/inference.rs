// SPDX-License-Identifier: AGPL-3.0-only

//! Host driver
//!
//! The register-level control sequence a host processor runs against the
//! accelerator: reset, configure, start, poll for completion, collect the
//! output stream. Time only advances while the driver waits, one device tick
//! per poll.

use crate::device::Accelerator;
use crate::error::{NnError, Result};
use crate::fixed::Fixed;
use crate::mmio::Status;
use crate::stream::Beat;
use crate::topology::Topology;
use nnacc_chip::regs::{self, ctrl};
use nnacc_chip::topology::{DRAIN_CYCLES, TABLE_READ_LATENCY};
use tracing::{debug, info, warn};

/// Ticks SOFT_RESET is held, and the settle time after releasing it.
pub const RESET_HOLD_CYCLES: u64 = 4;

/// Wait budget multiplier over the stall-free cycle estimate.
const TIMEOUT_MARGIN: u64 = 4;

/// Inference configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceConfig {
    /// Completion wait budget in cycles; 0 waits forever.
    pub timeout_cycles: u64,
}

impl InferenceConfig {
    /// Budget derived from the topology: a margin over the stall-free cycle count.
    pub fn for_topology(topology: &Topology, num_parallel: usize) -> Self {
        let timeout_cycles = estimate_cycles(topology, num_parallel) * TIMEOUT_MARGIN;
        debug!("Inference config: {topology}, timeout {timeout_cycles} cycles");
        Self { timeout_cycles }
    }

    /// No timeout.
    pub const fn unbounded() -> Self {
        Self { timeout_cycles: 0 }
    }
}

/// Cycle count of one run with no stalls on either port, from the tick that
/// samples START to the one that enters `Done`.
///
/// Per lane group: the weight vector, one command per input, then the lane
/// pipeline (command register, drain, address, table read, emit), the
/// barrier and the store.
pub fn estimate_cycles(topology: &Topology, num_parallel: usize) -> u64 {
    let group_tail = u64::from(DRAIN_CYCLES) + u64::from(TABLE_READ_LATENCY) + 5;
    let mut cycles = 1 + topology.input_size() as u64;
    for layer in 1..topology.layer_count() {
        let prev = topology.size(layer - 1) as u64;
        let groups = topology.group_count(layer, num_parallel) as u64;
        cycles += topology.size(layer) as u64 + groups * (2 * prev + group_tail) + 1;
    }
    cycles + topology.output_size() as u64
}

/// Outputs of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    /// Output-layer values in stream order.
    pub outputs: Vec<Fixed>,
    /// Ticks from start to completion.
    pub cycles: u64,
}

impl InferenceResult {
    /// Predicted class.
    pub fn classify(&self) -> usize {
        classify(&self.outputs)
    }

    /// Confidence of the predicted class.
    pub fn confidence(&self) -> f32 {
        confidence(&self.outputs, self.classify())
    }
}

/// Index of the first maximum; 0 for an empty slice.
pub fn classify(outputs: &[Fixed]) -> usize {
    let mut best = 0;
    for (i, v) in outputs.iter().enumerate().skip(1) {
        if *v > outputs[best] {
            best = i;
        }
    }
    best
}

/// `outputs[class]` normalized by the sum of all outputs when that sum is
/// positive, otherwise the raw value.
pub fn confidence(outputs: &[Fixed], class: usize) -> f32 {
    let Some(value) = outputs.get(class).map(|v| v.to_f32()) else {
        return 0.0;
    };
    let sum: f32 = outputs.iter().map(|v| v.to_f32()).sum();
    if sum > 0.0 {
        value / sum
    } else {
        value
    }
}

/// Register-level driver for one accelerator.
#[derive(Debug)]
pub struct NnDriver {
    dev: Accelerator,
    config: Option<InferenceConfig>,
    initialized: bool,
}

impl NnDriver {
    /// Wrap a device; nothing is written until [`NnDriver::init`] or the first run.
    pub fn new(dev: Accelerator) -> Self {
        Self {
            dev,
            config: None,
            initialized: false,
        }
    }

    /// Fix the wait budget instead of deriving it per run.
    #[must_use]
    pub fn with_config(mut self, config: InferenceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Soft reset, then program the topology.
    ///
    /// # Errors
    ///
    /// Returns error if the topology does not fit the device.
    pub fn init(&mut self, topology: &Topology) -> Result<()> {
        self.reset()?;
        self.configure(topology)?;
        self.initialized = true;
        info!("nn driver initialized: {topology}");
        Ok(())
    }

    /// Hold SOFT_RESET, then release it with enable cleared.
    ///
    /// # Errors
    ///
    /// Returns error if the control register cannot be written.
    pub fn reset(&mut self) -> Result<()> {
        self.dev.write32(regs::CTRL, ctrl::SOFT_RESET)?;
        self.dev.run(RESET_HOLD_CYCLES);
        self.dev.write32(regs::CTRL, 0)?;
        self.dev.run(RESET_HOLD_CYCLES);
        debug!("soft reset complete");
        Ok(())
    }

    /// Program NUM_LAYERS and the size registers.
    ///
    /// # Errors
    ///
    /// Returns error if a size is out of range or the device is busy.
    pub fn configure(&mut self, topology: &Topology) -> Result<()> {
        let sizes = topology.sizes();
        let targets: &[usize] = match sizes.len() {
            4 => &regs::LAYER_SIZE_REGS,
            3 => &[regs::NUM_IN, regs::NUM_H1, regs::NUM_OUT],
            _ => &[regs::NUM_IN, regs::NUM_OUT],
        };
        self.dev.write32(regs::NUM_LAYERS, reg_value(sizes.len())?)?;
        for (&offset, &size) in targets.iter().zip(sizes) {
            self.dev.write32(offset, reg_value(size)?)?;
        }
        Ok(())
    }

    /// BUSY bit.
    pub fn is_busy(&self) -> bool {
        self.dev.status().busy
    }

    /// DONE bit.
    pub fn is_done(&self) -> bool {
        self.dev.status().done
    }

    /// Decoded STATUS.
    pub fn status(&self) -> Status {
        self.dev.status()
    }

    /// Set ENABLE and START, preserving the rest of CTRL.
    ///
    /// # Errors
    ///
    /// Returns error if the control register cannot be accessed.
    pub fn start(&mut self) -> Result<()> {
        let value = self.dev.read32(regs::CTRL)?;
        self.dev.write32(regs::CTRL, value | ctrl::ENABLE | ctrl::START)
    }

    /// Tick until DONE; returns the cycles waited.
    ///
    /// # Errors
    ///
    /// Returns [`NnError::Timeout`] once `timeout_cycles` ticks pass without
    /// completion. A budget of 0 never times out.
    pub fn wait_done(&mut self, timeout_cycles: u64) -> Result<u64> {
        let mut waited = 0;
        while !self.is_done() {
            if timeout_cycles > 0 && waited >= timeout_cycles {
                return Err(NnError::Timeout { cycles: waited });
            }
            self.dev.tick();
            waited += 1;
        }
        Ok(waited)
    }

    /// Run one inference over a prepared beat stream.
    ///
    /// Initializes with the device's current topology on first use. A run
    /// left in `Done` is released first and one still in flight is
    /// soft-reset. Leaves the device idle on return; after a timeout it is
    /// soft-reset.
    ///
    /// # Errors
    ///
    /// Returns error on timeout, or if the output count differs from
    /// `num_outputs`.
    pub fn run_inference(&mut self, stream: &[Beat], num_outputs: usize) -> Result<InferenceResult> {
        let topology = self.dev.sequencer().topology().clone();
        if !self.initialized {
            self.init(&topology)?;
        }
        let num_parallel = self.dev.config().num_parallel;
        let expected = topology.stream_len(num_parallel);
        if stream.len() != expected {
            warn!(
                "stream has {} beats, {topology} consumes {expected}",
                stream.len()
            );
        }

        self.release()?;

        let stale = self.dev.take_output();
        if !stale.is_empty() {
            debug!("discarded {} stale output beats", stale.len());
        }
        self.dev.push_input(stream.iter().copied());
        let started = self.dev.cycles();
        self.start()?;

        let timeout = self
            .config
            .unwrap_or_else(|| InferenceConfig::for_topology(&topology, num_parallel))
            .timeout_cycles;
        if let Err(e) = self.wait_done(timeout) {
            warn!("inference aborted: {e}");
            self.dev.flush_input();
            self.reset()?;
            return Err(e);
        }
        let cycles = self.dev.cycles() - started;
        let outputs = self.dev.take_output();

        let leftover = self.dev.pending_input();
        if leftover > 0 {
            warn!("{leftover} input beats left unconsumed");
            self.dev.flush_input();
        }
        self.dev.write32(regs::CTRL, 0)?;
        self.dev.tick();

        if outputs.len() != num_outputs {
            return Err(NnError::stream_mismatch(format!(
                "expected {num_outputs} outputs, got {}",
                outputs.len()
            )));
        }
        info!("inference complete in {cycles} cycles");
        Ok(InferenceResult { outputs, cycles })
    }

    /// Bring the sequencer back to `Idle` so a new START is accepted.
    fn release(&mut self) -> Result<()> {
        let status = self.status();
        if status.busy {
            warn!("device busy in {status}, resetting before inference");
            self.reset()?;
        } else if status.done {
            debug!("releasing completed run");
            self.dev.write32(regs::CTRL, 0)?;
            self.dev.tick();
        }
        Ok(())
    }

    /// The device.
    pub const fn device(&self) -> &Accelerator {
        &self.dev
    }

    /// The device, mutably.
    pub fn device_mut(&mut self) -> &mut Accelerator {
        &mut self.dev
    }

    /// Release the device.
    pub fn into_device(self) -> Accelerator {
        self.dev
    }
}

fn reg_value(v: usize) -> Result<u32> {
    u32::try_from(v).map_err(|_| NnError::invalid_config(format!("{v} does not fit a register")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::{AcceleratorConfig, SequencerState};
    use crate::stream::packetize;

    fn fx(v: &[f32]) -> Vec<Fixed> {
        v.iter().map(|&x| Fixed::from_f32(x)).collect()
    }

    fn driver(lanes: usize) -> NnDriver {
        NnDriver::new(Accelerator::new(AcceleratorConfig::default().with_num_parallel(lanes)).unwrap())
    }

    #[test]
    fn classify_picks_first_maximum() {
        assert_eq!(classify(&fx(&[0.1, 0.9, 0.9, 0.2])), 1);
        assert_eq!(classify(&fx(&[-1.0])), 0);
        assert_eq!(classify(&[]), 0);
    }

    #[test]
    fn confidence_normalizes_positive_sums() {
        let out = fx(&[0.25, 0.75]);
        assert!((confidence(&out, 1) - 0.75).abs() < 1e-6);
        let neg = fx(&[-0.5, -0.25]);
        assert!((confidence(&neg, 1) + 0.25).abs() < 1e-6);
        assert!(confidence(&out, 7).abs() < f32::EPSILON);
    }

    #[test]
    fn configure_writes_selected_registers() {
        let mut d = driver(2);
        d.init(&Topology::new(&[5, 3, 2]).unwrap()).unwrap();
        let dev = d.device();
        assert_eq!(dev.read32(regs::NUM_LAYERS).unwrap(), 3);
        assert_eq!(dev.read32(regs::NUM_IN).unwrap(), 5);
        assert_eq!(dev.read32(regs::NUM_H1).unwrap(), 3);
        assert_eq!(dev.read32(regs::NUM_OUT).unwrap(), 2);
        assert_eq!(dev.sequencer().topology().sizes(), &[5, 3, 2]);
    }

    #[test]
    fn run_inference_reports_outputs_and_cycles() {
        let mut d = driver(2);
        d.init(&Topology::new(&[2, 2]).unwrap()).unwrap();
        let stream = packetize(&fx(&[1.0, 0.5, 0.0, 1.0, 0.0, 1.0]));
        let r = d.run_inference(&stream, 2).unwrap();
        let t = crate::ActivationTable::sigmoid();
        // both lanes: bias + in[1]·w[1] = bias + 0.5
        assert_eq!(r.outputs, vec![t.lookup(Fixed::from_f32(0.5)), t.lookup(Fixed::from_f32(1.5))]);
        assert_eq!(r.cycles, estimate_cycles(&Topology::new(&[2, 2]).unwrap(), 2));
        assert_eq!(d.status().sequencer_state(), Some(SequencerState::Idle));

        // a second run is bit-identical
        let again = d.run_inference(&stream, 2).unwrap();
        assert_eq!(again, r);
    }

    #[test]
    fn starved_stream_times_out_and_resets() {
        let mut d = driver(2).with_config(InferenceConfig { timeout_cycles: 50 });
        d.init(&Topology::new(&[2, 2]).unwrap()).unwrap();
        let stream = packetize(&fx(&[1.0, 0.5]));
        let err = d.run_inference(&stream, 2).unwrap_err();
        assert!(matches!(err, NnError::Timeout { cycles: 50 }));
        assert!(!d.is_busy());
        assert_eq!(d.status().sequencer_state(), Some(SequencerState::Idle));
    }

    #[test]
    fn wait_done_zero_budget_waits_until_done() {
        let mut d = driver(1);
        d.init(&Topology::new(&[1, 1]).unwrap()).unwrap();
        d.device_mut().push_input(packetize(&fx(&[1.0, 0.5, 1.0])));
        d.start().unwrap();
        let waited = d.wait_done(0).unwrap();
        assert!(waited > 0);
        assert!(d.is_done());
    }

    #[test]
    fn run_inference_after_manual_run() {
        let mut d = driver(1);
        d.init(&Topology::new(&[1, 1]).unwrap()).unwrap();
        let stream = packetize(&fx(&[1.0, 0.5, 1.0]));
        d.device_mut().push_input(stream.iter().copied());
        d.start().unwrap();
        d.wait_done(0).unwrap();
        let manual = d.device_mut().take_output();
        assert!(d.is_done());

        let r = d.run_inference(&stream, 1).unwrap();
        assert_eq!(r.outputs, manual);
        assert_eq!(r.cycles, estimate_cycles(&Topology::new(&[1, 1]).unwrap(), 1));
        assert_eq!(d.status().sequencer_state(), Some(SequencerState::Idle));
    }

    #[test]
    fn run_inference_resets_a_run_in_flight() {
        let mut d = driver(2);
        let topology = Topology::new(&[2, 2]).unwrap();
        d.init(&topology).unwrap();
        d.device_mut().push_input(packetize(&fx(&[1.0, 0.5])));
        d.start().unwrap();
        d.device_mut().run(10);
        assert!(d.is_busy());
        d.device_mut().flush_input();

        let stream = packetize(&fx(&[1.0, 0.5, 0.0, 1.0, 0.0, 1.0]));
        let r = d.run_inference(&stream, 2).unwrap();
        assert_eq!(r.outputs.len(), 2);
        assert_eq!(r.cycles, estimate_cycles(&topology, 2));
    }

    #[test]
    fn lazy_init_uses_device_topology() {
        let mut dev = Accelerator::new(AcceleratorConfig::default().with_num_parallel(1)).unwrap();
        dev.write32(regs::NUM_LAYERS, 2).unwrap();
        dev.write32(regs::NUM_IN, 1).unwrap();
        dev.write32(regs::NUM_OUT, 1).unwrap();
        let mut d = NnDriver::new(dev);
        let r = d.run_inference(&packetize(&fx(&[1.0, 0.25, 1.0])), 1).unwrap();
        assert_eq!(r.outputs.len(), 1);
    }
}
