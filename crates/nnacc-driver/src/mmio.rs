// SPDX-License-Identifier: AGPL-3.0-only

//! Memory-mapped control registers
//!
//! Word-addressed register file in front of the sequencer. Offsets and bit
//! fields come from [`nnacc_chip::regs`]; this module owns the storage and
//! the write rules.
//!
//! | Offset | Name | Access |
//! |--------|------|--------|
//! | 0x00 | CTRL | R/W, START clears when a run begins |
//! | 0x04 | STATUS | R/O |
//! | 0x08..0x14 | NUM_IN, NUM_H1, NUM_H2, NUM_OUT | R/W, 1..=max_width |
//! | 0x18 | NUM_LAYERS | R/W, 2..=4 |

use crate::error::{NnError, Result};
use crate::sequencer::{ControlInputs, SequencerState};
use crate::topology::Topology;
use nnacc_chip::regs::{self, ctrl, status};
use nnacc_chip::topology::{LayerDims, MAX_LAYERS, MIN_LAYERS};
use tracing::debug;

/// Register storage and access rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    ctrl: u32,
    status: u32,
    layer_sizes: [u32; MAX_LAYERS],
    num_layers: u32,
    max_width: usize,
}

impl RegisterFile {
    /// Reset values: CTRL clear, MNIST layer sizes (clamped to `max_width`),
    /// four layers.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(max_width: usize) -> Self {
        let dims = LayerDims::MNIST.as_array();
        let cap = u32::try_from(max_width).unwrap_or(u32::MAX);
        Self {
            ctrl: 0,
            status: 0,
            layer_sizes: dims.map(|d| u32::from(d).min(cap)),
            num_layers: MAX_LAYERS as u32,
            max_width,
        }
    }

    fn check_offset(offset: usize) -> Result<()> {
        if offset % 4 != 0 || offset >= regs::REGION_SIZE {
            return Err(NnError::InvalidRegister { offset });
        }
        Ok(())
    }

    /// Read a register.
    ///
    /// # Errors
    ///
    /// Returns error for unaligned or unmapped offsets.
    pub fn read32(&self, offset: usize) -> Result<u32> {
        Self::check_offset(offset)?;
        Ok(match offset {
            regs::CTRL => self.ctrl,
            regs::STATUS => self.status,
            regs::NUM_LAYERS => self.num_layers,
            _ => self.layer_sizes[Self::size_index(offset)],
        })
    }

    /// Write a register.
    ///
    /// # Errors
    ///
    /// Returns error for unmapped offsets, STATUS, or out-of-range values.
    pub fn write32(&mut self, offset: usize, value: u32) -> Result<()> {
        Self::check_offset(offset)?;
        match offset {
            regs::CTRL => self.ctrl = value & ctrl::MASK,
            regs::STATUS => return Err(NnError::InvalidRegister { offset }),
            regs::NUM_LAYERS => {
                let n = value as usize;
                if !(MIN_LAYERS..=MAX_LAYERS).contains(&n) {
                    return Err(NnError::invalid_config(format!(
                        "NUM_LAYERS {value} outside {MIN_LAYERS}..={MAX_LAYERS}"
                    )));
                }
                self.num_layers = value;
            }
            _ => {
                if value == 0 || value as usize > self.max_width {
                    return Err(NnError::invalid_config(format!(
                        "layer size {value} at {offset:#04x} outside 1..={}",
                        self.max_width
                    )));
                }
                self.layer_sizes[Self::size_index(offset)] = value;
            }
        }
        debug!("reg write {offset:#04x} <- {value:#x}");
        Ok(())
    }

    fn size_index(offset: usize) -> usize {
        (offset - regs::NUM_IN) / 4
    }

    /// Whether `offset` holds part of the topology.
    pub fn is_topology_reg(offset: usize) -> bool {
        offset == regs::NUM_LAYERS || regs::LAYER_SIZE_REGS.contains(&offset)
    }

    /// Topology selected by NUM_LAYERS and the size registers.
    ///
    /// # Errors
    ///
    /// Only if the stored values are inconsistent, which the write rules prevent.
    pub fn topology(&self) -> Result<Topology> {
        let [input, h1, h2, output] = self.layer_sizes.map(|v| v as usize);
        match self.num_layers {
            4 => Topology::new(&[input, h1, h2, output]),
            3 => Topology::new(&[input, h1, output]),
            _ => Topology::new(&[input, output]),
        }
    }

    /// Control lines as the sequencer samples them.
    pub const fn control(&self) -> ControlInputs {
        ControlInputs {
            enable: self.ctrl & ctrl::ENABLE != 0,
            start: self.ctrl & ctrl::START != 0,
            soft_reset: self.ctrl & ctrl::SOFT_RESET != 0,
        }
    }

    /// Drop the START bit once a run has begun.
    pub fn clear_start(&mut self) {
        self.ctrl &= !ctrl::START;
    }

    /// Mirror the sequencer into STATUS.
    pub fn update_status(&mut self, busy: bool, done: bool, state: SequencerState) {
        let mut value = state.code() << status::STATE_SHIFT;
        if busy {
            value |= status::BUSY;
        }
        if done {
            value |= status::DONE;
        }
        self.status = value;
    }
}

/// Decoded STATUS register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// A run is in progress.
    pub busy: bool,
    /// The last run completed.
    pub done: bool,
    /// FSM state code (bits 4..7).
    pub state: u32,
}

impl Status {
    /// Decode a raw STATUS value.
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            busy: bits & status::BUSY != 0,
            done: bits & status::DONE != 0,
            state: (bits & status::STATE_MASK) >> status::STATE_SHIFT,
        }
    }

    /// Sequencer state, if the code is known.
    pub const fn sequencer_state(&self) -> Option<SequencerState> {
        SequencerState::from_code(self.state)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.sequencer_state() {
            Some(s) => write!(f, "busy={} done={} state={s:?}", self.busy, self.done),
            None => write!(f, "busy={} done={} state=#{}", self.busy, self.done, self.state),
        }
    }
}
