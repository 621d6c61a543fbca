// SPDX-License-Identifier: AGPL-3.0-only

//! Numeric formats of the data path.
//!
//! ## Value format
//!
//! ```text
//!  15  14  13  12  11  10 ...  0
//! [ S | integer (4) | fraction (11) ]     Q4.11, range [-16.0, +15.9995]
//! ```
//!
//! Products of two Q4.11 values carry 22 fractional bits and are summed in a
//! 32-bit accumulator. Biases are pre-shifted by [`FRAC_BITS`] to the same
//! scale; the final result is shifted back and saturated to 16 bits.

/// Fractional bits of a stored value.
pub const FRAC_BITS: u32 = 11;

/// Raw value of 1.0.
pub const ONE: i16 = 1 << FRAC_BITS;

/// Scale factor between real numbers and raw values.
pub const SCALE: f32 = ONE as f32;

/// Width of a stored value.
pub const VALUE_BITS: u32 = 16;

/// Width of the accumulator.
pub const ACC_BITS: u32 = 32;

/// Activation table geometry and address mapping.
///
/// The pre-activation value is widened, multiplied by 16 and offset by the
/// encoding of +8.0 at that scale, re-centering [-8, +8) onto [0, 16). A
/// 10-bit window of that field at 1/64 resolution is the table address.
pub mod lut {
    /// Address width.
    pub const ADDR_BITS: u32 = 10;
    /// Number of table entries.
    pub const ENTRIES: usize = 1 << ADDR_BITS;
    /// Highest address.
    pub const MAX_ADDR: u16 = (ENTRIES - 1) as u16;
    /// Left shift applied when widening (×16).
    pub const PRESCALE_SHIFT: u32 = 4;
    /// Fractional bits of the widened field.
    pub const WIDE_FRAC_BITS: u32 = super::FRAC_BITS + PRESCALE_SHIFT;
    /// Encoding of +8.0 in the widened field.
    pub const OFFSET: i32 = 8 << WIDE_FRAC_BITS;
    /// Encoding of +16.0 in the widened field; at or above this the address saturates.
    pub const SPAN: i32 = 16 << WIDE_FRAC_BITS;
    /// Lowest bit of the address window (1/64 granularity).
    pub const WINDOW_SHIFT: u32 = WIDE_FRAC_BITS - 6;
    /// Real input mapped to address 0.
    pub const INPUT_MIN: f32 = -8.0;
    /// Real input mapped to the last entry.
    pub const INPUT_MAX: f32 = 8.0;
}
