// SPDX-License-Identifier: AGPL-3.0-only

//! Register map of the accelerator's configuration/status slave.
//!
//! All registers are 32 bits wide and word aligned.
//!
//! ```text
//! 0x00  CTRL        enable / start (cleared on run start) / soft reset
//! 0x04  STATUS      busy, done, FSM state in bits 4..7        (read-only)
//! 0x08  NUM_IN      input layer size                          (default 784)
//! 0x0C  NUM_H1      hidden layer 1 size                       (default 16)
//! 0x10  NUM_H2      hidden layer 2 size                       (default 16)
//! 0x14  NUM_OUT     output layer size                         (default 10)
//! 0x18  NUM_LAYERS  layer count including the input layer     (default 4)
//! ```

// ── Offsets ──────────────────────────────────────────────────────────────────

/// Control register.
pub const CTRL: usize = 0x00;
/// Status register (read-only).
pub const STATUS: usize = 0x04;
/// Input layer size.
pub const NUM_IN: usize = 0x08;
/// Hidden layer 1 size.
pub const NUM_H1: usize = 0x0C;
/// Hidden layer 2 size.
pub const NUM_H2: usize = 0x10;
/// Output layer size.
pub const NUM_OUT: usize = 0x14;
/// Number of layers, input layer included. 3 drops `NUM_H2`, 2 drops both hidden layers.
pub const NUM_LAYERS: usize = 0x18;

/// Size registers in layer order.
pub const LAYER_SIZE_REGS: [usize; 4] = [NUM_IN, NUM_H1, NUM_H2, NUM_OUT];

/// One past the last mapped offset.
pub const REGION_SIZE: usize = 0x1C;

// ── Control register bit definitions ─────────────────────────────────────────

/// `CTRL` bits.
pub mod ctrl {
    /// Enable the accelerator. Withdrawing it releases `Done` back to `Idle`.
    pub const ENABLE: u32 = 1 << 0;
    /// Start an inference. Cleared by hardware once the run leaves `Idle`.
    pub const START: u32 = 1 << 1;
    /// Soft reset; holds the sequencer and all lanes in `Idle` while set.
    pub const SOFT_RESET: u32 = 1 << 2;
    /// Bits that are actually stored.
    pub const MASK: u32 = ENABLE | START | SOFT_RESET;
}

// ── Status register bit definitions ──────────────────────────────────────────

/// `STATUS` bits.
pub mod status {
    /// A run is in progress.
    pub const BUSY: u32 = 1 << 0;
    /// The last run completed; mirrors the completion interrupt.
    pub const DONE: u32 = 1 << 1;
    /// Current FSM state code field.
    pub const STATE_MASK: u32 = 0xF << STATE_SHIFT;
    /// Position of the FSM state code.
    pub const STATE_SHIFT: u32 = 4;
}

// ── FSM state codes (STATUS bits 4..7) ───────────────────────────────────────

/// FSM state codes reported in `STATUS`.
pub mod state {
    /// Waiting for enable + start.
    pub const IDLE: u32 = 0;
    /// Streaming the input vector in.
    pub const LOAD_INPUT: u32 = 1;
    /// Streaming the current layer's biases in.
    pub const LOAD_BIAS: u32 = 2;
    /// Streaming one lane group's weight vector in.
    pub const LOAD_WEIGHTS: u32 = 3;
    /// Driving the lanes through the MAC phase.
    pub const COMPUTE: u32 = 4;
    /// Barrier: waiting for every lane to finish.
    pub const ACTIVATE: u32 = 5;
    /// Writing lane results into the output buffer.
    pub const STORE: u32 = 6;
    /// Output buffer becomes the next layer's input.
    pub const NEXT_LAYER: u32 = 7;
    /// Streaming the final layer out.
    pub const OUTPUT: u32 = 8;
    /// Run complete, interrupt asserted.
    pub const DONE: u32 = 9;
}
