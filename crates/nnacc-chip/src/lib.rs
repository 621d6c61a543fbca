// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model for the nnacc fixed-point MLP accelerator.
//!
//! This crate has **no dependencies** and **no behaviour**: it is a pure
//! description of the IP block: register offsets and bit fields, the Q4.11
//! number format, activation-table geometry and the default network shape.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | AXI-Lite register map: offsets, control/status bits, FSM state codes |
//! | [`qformat`] | Q4.11 value format, accumulator scale, activation-table addressing constants |
//! | [`topology`] | Default 784→16→16→10 shape, buffer limits, lane count, pipeline latencies |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod qformat;
pub mod regs;
pub mod topology;
