// SPDX-License-Identifier: AGPL-3.0-only

//! Q4.11 fixed-point arithmetic
//!
//! The data path only ever does four things with numbers: multiply two
//! 16-bit values into a 32-bit product, add products into an accumulator,
//! load a bias into the accumulator at product scale, and shift the sum back
//! to 16 bits with saturation. Those four are the free functions below; every
//! stored value is produced by [`finalize`] or by the host, so it is always a
//! saturated result.

use nnacc_chip::qformat::{FRAC_BITS, ONE, SCALE};
use std::fmt;

/// Signed Q4.11 value (1 sign, 4 integer, 11 fraction bits).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i16);

impl Fixed {
    /// 0.0
    pub const ZERO: Self = Self(0);
    /// 1.0
    pub const ONE: Self = Self(ONE);
    /// Largest value, ≈ +15.9995 (`0x7FFF`).
    pub const MAX: Self = Self(i16::MAX);
    /// Smallest value, -16.0 (`0x8000`).
    pub const MIN: Self = Self(i16::MIN);

    /// Wrap a raw two's-complement value.
    pub const fn from_raw(raw: i16) -> Self {
        Self(raw)
    }

    /// Raw two's-complement value.
    pub const fn raw(self) -> i16 {
        self.0
    }

    /// Reinterpret a 16-bit bus word.
    #[allow(clippy::cast_possible_wrap)]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits as i16)
    }

    /// The 16-bit bus word.
    #[allow(clippy::cast_sign_loss)]
    pub const fn to_bits(self) -> u16 {
        self.0 as u16
    }

    /// Convert from a real number, rounding half to even and saturating.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f32(value: f32) -> Self {
        let scaled = (value * SCALE).round_ties_even();
        Self(scaled.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16)
    }

    /// Convert to a real number.
    pub fn to_f32(self) -> f32 {
        f32::from(self.0) / SCALE
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.to_f32())
    }
}

/// 32-bit accumulator holding sums at product scale (22 fractional bits).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulator(i32);

impl Accumulator {
    /// Empty accumulator.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw accumulator value.
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw accumulator value.
    pub const fn raw(self) -> i32 {
        self.0
    }
}

/// Exact product of two values. Cannot overflow: |i16 × i16| ≤ 2^30.
pub fn multiply(a: Fixed, b: Fixed) -> Accumulator {
    Accumulator(i32::from(a.0) * i32::from(b.0))
}

/// Plain 32-bit addition of a product into the accumulator.
///
/// Not saturating. The accumulator is wide enough for the buffer width
/// (784 terms); beyond that the sum wraps exactly as the adder would.
pub fn accumulate(acc: Accumulator, product: Accumulator) -> Accumulator {
    Accumulator(acc.0.wrapping_add(product.0))
}

/// Bias aligned to product scale.
pub fn load_bias(bias: Fixed) -> Accumulator {
    Accumulator(i32::from(bias.0) << FRAC_BITS)
}

/// Arithmetic shift back to Q4.11 and saturate to 16 bits.
#[allow(clippy::cast_possible_truncation)]
pub fn finalize(acc: Accumulator) -> Fixed {
    let shifted = acc.0 >> FRAC_BITS;
    Fixed(shifted.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16)
}
