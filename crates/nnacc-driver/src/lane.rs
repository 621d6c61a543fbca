// SPDX-License-Identifier: AGPL-3.0-only

//! Compute lane: one neuron's multiply-accumulate and activation
//!
//! A lane has no notion of fan-in. The sequencer drives it one command per
//! tick: load the bias, or accumulate one input × weight product. When both
//! controls drop the lane drains its MAC pipeline, finalizes the sum, looks
//! the result up in the activation table and pulses `done` for one tick.
//!
//! ```text
//!           load_bias | accumulate            no command
//!   Idle ───────────────────────► Accumulating ──────────► Draining (2)
//!    ▲                                                         │
//!    │  done pulse                                             ▼
//!    └──────────── Emitting ◄──────────── LookingUp (table read issued)
//! ```
//!
//! The multiplier output is registered: a product latched on tick *t* lands
//! in the accumulator on tick *t + 1*, which is what the drain stage covers.

use crate::activation::ActivationTable;
use crate::fixed::{accumulate, finalize, load_bias, multiply, Accumulator, Fixed};
use nnacc_chip::topology::DRAIN_CYCLES;
use tracing::trace;

/// Lane FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    /// Not busy; accumulator unused.
    Idle,
    /// Receiving bias/MAC commands.
    Accumulating,
    /// Waiting for the MAC pipeline to settle.
    Draining,
    /// Finalize and table address computed, table read in flight.
    LookingUp,
    /// Result valid, `done` pulses.
    Emitting,
}

/// Per-tick control and data presented to a lane.
///
/// The values are copies of sequencer buffer entries; a lane never sees the
/// buffers themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneCommand {
    /// Load the accumulator from `bias`.
    pub load_bias: bool,
    /// Add `input × weight` into the accumulator.
    pub accumulate: bool,
    /// Broadcast input element.
    pub input: Fixed,
    /// Weight for this tick.
    pub weight: Fixed,
    /// This lane's bias.
    pub bias: Fixed,
    /// Apply the activation table (false = linear pass-through).
    pub activate: bool,
}

impl LaneCommand {
    /// Both controls deasserted.
    pub const IDLE: Self = Self {
        load_bias: false,
        accumulate: false,
        input: Fixed::ZERO,
        weight: Fixed::ZERO,
        bias: Fixed::ZERO,
        activate: false,
    };

    /// Whether this command drives the accumulator.
    pub const fn is_active(&self) -> bool {
        self.load_bias || self.accumulate
    }
}

/// One neuron engine.
#[derive(Debug, Clone)]
pub struct ComputeLane {
    state: LaneState,
    acc: Accumulator,
    /// Multiplier output register.
    product: Option<Accumulator>,
    drain: u8,
    activate: bool,
    pre_activation: Fixed,
    table_addr: u16,
    result: Fixed,
    done: bool,
}

impl Default for ComputeLane {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeLane {
    /// A cleared lane.
    pub const fn new() -> Self {
        Self {
            state: LaneState::Idle,
            acc: Accumulator::ZERO,
            product: None,
            drain: 0,
            activate: false,
            pre_activation: Fixed::ZERO,
            table_addr: 0,
            result: Fixed::ZERO,
            done: false,
        }
    }

    /// Synchronous clear; overrides whatever the lane was doing.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Advance one clock.
    ///
    /// If a command asserts both controls, the bias load wins.
    pub fn tick(&mut self, cmd: &LaneCommand, table: &ActivationTable) {
        if let Some(p) = self.product.take() {
            self.acc = accumulate(self.acc, p);
        }
        self.done = false;

        match self.state {
            LaneState::Idle | LaneState::Accumulating => {
                if cmd.load_bias {
                    self.acc = load_bias(cmd.bias);
                    self.activate = cmd.activate;
                    self.state = LaneState::Accumulating;
                } else if cmd.accumulate {
                    self.product = Some(multiply(cmd.input, cmd.weight));
                    self.activate = cmd.activate;
                    self.state = LaneState::Accumulating;
                } else if self.state == LaneState::Accumulating {
                    self.drain = 0;
                    self.state = LaneState::Draining;
                }
            }
            LaneState::Draining => {
                self.drain += 1;
                if self.drain >= DRAIN_CYCLES {
                    self.state = LaneState::LookingUp;
                }
            }
            LaneState::LookingUp => {
                self.pre_activation = finalize(self.acc);
                self.table_addr = ActivationTable::address(self.pre_activation);
                self.state = LaneState::Emitting;
            }
            LaneState::Emitting => {
                self.result = if self.activate {
                    table.read(self.table_addr)
                } else {
                    self.pre_activation
                };
                trace!(
                    pre = self.pre_activation.raw(),
                    addr = self.table_addr,
                    result = self.result.raw(),
                    "lane emit"
                );
                self.done = true;
                self.acc = Accumulator::ZERO;
                self.state = LaneState::Idle;
            }
        }
    }

    /// Current FSM state.
    pub const fn state(&self) -> LaneState {
        self.state
    }

    /// Whether a neuron is in flight.
    pub fn is_busy(&self) -> bool {
        self.state != LaneState::Idle
    }

    /// Completion pulse, high for exactly one tick after `Emitting`.
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Last emitted result; held until the next neuron completes.
    pub const fn result(&self) -> Fixed {
        self.result
    }

    /// Last finalized pre-activation value.
    pub const fn pre_activation(&self) -> Fixed {
        self.pre_activation
    }

    /// Accumulator contents.
    pub const fn accumulator(&self) -> Accumulator {
        self.acc
    }
}
