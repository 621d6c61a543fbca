// SPDX-License-Identifier: AGPL-3.0-only

//! Simulated accelerator device
//!
//! Puts the [`RegisterFile`] in front of a [`LayerSequencer`] and attaches a
//! queue to each stream port. The host side talks to it through
//! [`Accelerator::read32`]/[`Accelerator::write32`] and advances time with
//! [`Accelerator::tick`].

use crate::activation::ActivationTable;
use crate::error::{NnError, Result};
use crate::fixed::Fixed;
use crate::mmio::{RegisterFile, Status};
use crate::sequencer::{AcceleratorConfig, LayerSequencer, SequencerState};
use crate::stream::{Beat, BeatCollector, BeatQueue};
use nnacc_chip::regs;

/// The accelerator core with its register file and stream ports.
#[derive(Debug, Clone)]
pub struct Accelerator {
    regs: RegisterFile,
    seq: LayerSequencer,
    input: BeatQueue,
    output: BeatCollector,
    cycles: u64,
}

impl Accelerator {
    /// Device with the built-in sigmoid table.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(config: AcceleratorConfig) -> Result<Self> {
        Self::with_table(config, ActivationTable::sigmoid())
    }

    /// Device with a custom activation table.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn with_table(config: AcceleratorConfig, table: ActivationTable) -> Result<Self> {
        let regs = RegisterFile::new(config.max_width);
        let mut seq = LayerSequencer::new(config, table)?;
        seq.set_topology(regs.topology()?)?;
        Ok(Self {
            regs,
            seq,
            input: BeatQueue::new(),
            output: BeatCollector::new(),
            cycles: 0,
        })
    }

    /// Replace the input port (e.g. with a stalling source).
    #[must_use]
    pub fn with_input(mut self, input: BeatQueue) -> Self {
        self.input = input;
        self
    }

    /// Replace the output port (e.g. with backpressure).
    #[must_use]
    pub fn with_output(mut self, output: BeatCollector) -> Self {
        self.output = output;
        self
    }

    /// Read a register; STATUS reflects the sequencer as of the last tick.
    ///
    /// # Errors
    ///
    /// Returns error for unmapped offsets.
    pub fn read32(&self, offset: usize) -> Result<u32> {
        self.regs.read32(offset)
    }

    /// Write a register.
    ///
    /// # Errors
    ///
    /// Returns error for invalid writes, or topology writes during a run.
    pub fn write32(&mut self, offset: usize, value: u32) -> Result<()> {
        let topology_reg = RegisterFile::is_topology_reg(offset);
        if topology_reg && self.seq.is_busy() {
            return Err(NnError::invalid_state(format!(
                "topology register {offset:#04x} written while busy"
            )));
        }
        self.regs.write32(offset, value)?;
        if topology_reg {
            self.seq.set_topology(self.regs.topology()?)?;
        }
        Ok(())
    }

    /// Decoded STATUS.
    pub fn status(&self) -> Status {
        Status::from_bits(self.regs.read32(regs::STATUS).unwrap_or(0))
    }

    /// Advance one clock.
    ///
    /// START stays pending until the sequencer accepts it.
    pub fn tick(&mut self) {
        let ctrl = self.regs.control();
        let before = self.seq.state();
        self.seq.tick(ctrl, &mut self.input, &mut self.output);
        if before == SequencerState::Idle && self.seq.state() == SequencerState::LoadInput {
            self.regs.clear_start();
        }
        self.regs
            .update_status(self.seq.is_busy(), self.seq.is_done(), self.seq.state());
        self.cycles += 1;
    }

    /// Advance `n` clocks.
    pub fn run(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Queue beats on the input port.
    pub fn push_input(&mut self, beats: impl IntoIterator<Item = Beat>) {
        self.input.extend(beats);
    }

    /// Beats waiting on the input port.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Drop beats the core did not consume.
    pub fn flush_input(&mut self) {
        self.input.clear();
    }

    /// Beats received on the output port since the last take.
    pub fn output_beats(&self) -> &[Beat] {
        self.output.beats()
    }

    /// Take the output payloads.
    pub fn take_output(&mut self) -> Vec<Fixed> {
        self.output.drain()
    }

    /// Interrupt line; mirrors the sequencer's completion signal.
    pub fn irq(&self) -> bool {
        self.seq.is_done()
    }

    /// Ticks since construction.
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The sequencer, for inspection.
    pub const fn sequencer(&self) -> &LayerSequencer {
        &self.seq
    }

    /// Build-time parameters.
    pub const fn config(&self) -> &AcceleratorConfig {
        self.seq.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::packetize;
    use nnacc_chip::regs::ctrl;

    fn small() -> Accelerator {
        let mut dev = Accelerator::new(AcceleratorConfig::default().with_num_parallel(2)).unwrap();
        dev.write32(regs::NUM_LAYERS, 2).unwrap();
        dev.write32(regs::NUM_IN, 2).unwrap();
        dev.write32(regs::NUM_OUT, 2).unwrap();
        dev
    }

    #[test]
    fn start_bit_self_clears() {
        let mut dev = small();
        dev.write32(regs::CTRL, ctrl::ENABLE | ctrl::START).unwrap();
        dev.tick();
        assert_eq!(dev.read32(regs::CTRL).unwrap(), ctrl::ENABLE);
        assert!(dev.status().busy);
        assert_eq!(dev.status().sequencer_state(), Some(SequencerState::LoadInput));
    }

    #[test]
    fn start_without_enable_is_ignored() {
        let mut dev = small();
        dev.write32(regs::CTRL, ctrl::START).unwrap();
        dev.run(3);
        assert!(!dev.status().busy);
        assert_eq!(dev.status().sequencer_state(), Some(SequencerState::Idle));
    }

    #[test]
    fn start_stays_pending_until_enabled() {
        let mut dev = small();
        dev.write32(regs::CTRL, ctrl::START).unwrap();
        dev.tick();
        assert_eq!(dev.read32(regs::CTRL).unwrap(), ctrl::START);

        let value = dev.read32(regs::CTRL).unwrap();
        dev.write32(regs::CTRL, value | ctrl::ENABLE).unwrap();
        dev.tick();
        assert_eq!(dev.status().sequencer_state(), Some(SequencerState::LoadInput));
        assert_eq!(dev.read32(regs::CTRL).unwrap(), ctrl::ENABLE);
    }

    #[test]
    fn start_held_in_done_is_not_replayed() {
        let mut dev = small();
        dev.push_input(packetize(&[Fixed::ZERO; 6]));
        dev.write32(regs::CTRL, ctrl::ENABLE | ctrl::START).unwrap();
        dev.run(200);
        assert!(dev.irq());
        dev.write32(regs::CTRL, ctrl::ENABLE | ctrl::START).unwrap();
        dev.tick();
        assert!(dev.irq());
        assert_eq!(dev.read32(regs::CTRL).unwrap(), ctrl::ENABLE | ctrl::START);
    }

    #[test]
    fn topology_locked_while_busy() {
        let mut dev = small();
        dev.write32(regs::CTRL, ctrl::ENABLE | ctrl::START).unwrap();
        dev.tick();
        assert!(matches!(
            dev.write32(regs::NUM_IN, 4),
            Err(NnError::InvalidState { .. })
        ));
        assert_eq!(dev.sequencer().topology().sizes(), &[2, 2]);
    }

    #[test]
    fn full_run_raises_irq() {
        let mut dev = small();
        let vals: Vec<Fixed> = [1.0, 0.5, 0.0, 0.25, 1.0, 1.0]
            .iter()
            .map(|&v| Fixed::from_f32(v))
            .collect();
        dev.push_input(packetize(&vals));
        dev.write32(regs::CTRL, ctrl::ENABLE | ctrl::START).unwrap();
        for _ in 0..200 {
            if dev.irq() {
                break;
            }
            dev.tick();
        }
        assert!(dev.irq());
        assert!(dev.status().done && !dev.status().busy);
        assert_eq!(dev.output_beats().len(), 2);
        assert!(dev.output_beats()[1].last);
        assert_eq!(dev.pending_input(), 0);

        dev.write32(regs::CTRL, 0).unwrap();
        dev.tick();
        assert!(!dev.irq());
        assert_eq!(dev.status().sequencer_state(), Some(SequencerState::Idle));
    }

    #[test]
    fn soft_reset_register_clears_run() {
        let mut dev = small();
        dev.write32(regs::CTRL, ctrl::ENABLE | ctrl::START).unwrap();
        dev.run(2);
        dev.write32(regs::CTRL, ctrl::SOFT_RESET).unwrap();
        dev.tick();
        let s = dev.status();
        assert!(!s.busy && !s.done);
        assert_eq!(s.state, 0);
    }
}
