// SPDX-License-Identifier: AGPL-3.0-only

//! Sigmoid activation table and its address mapping
//!
//! 1024 entries sample sigmoid(x) over [-8, +8]. The address of a
//! pre-activation value is computed entirely in integer arithmetic (see
//! [`nnacc_chip::qformat::lut`]); inputs outside the sampled range clamp to
//! the first or last entry instead of wrapping.

use crate::error::{NnError, Result};
use crate::fixed::Fixed;
use nnacc_chip::qformat::lut::{
    ENTRIES, INPUT_MAX, INPUT_MIN, MAX_ADDR, OFFSET, PRESCALE_SHIFT, SPAN, WINDOW_SHIFT,
};

/// Read-only activation lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationTable {
    entries: Vec<Fixed>,
}

impl ActivationTable {
    /// The table shipped with the block: entry *i* holds
    /// `round(sigmoid(i / 1023 · 16 − 8) · 2048)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn sigmoid() -> Self {
        let last = (ENTRIES - 1) as f64;
        let span = f64::from(INPUT_MAX - INPUT_MIN);
        let entries = (0..ENTRIES)
            .map(|i| {
                let x = (i as f64 / last) * span + f64::from(INPUT_MIN);
                let y = 1.0 / (1.0 + (-x).exp());
                #[allow(clippy::cast_possible_truncation)]
                Fixed::from_f32(y as f32)
            })
            .collect();
        Self { entries }
    }

    /// Build a table from externally supplied contents.
    ///
    /// # Errors
    ///
    /// Returns error if the table does not have exactly 1024 entries or is
    /// not monotonic non-decreasing.
    pub fn from_entries(entries: Vec<Fixed>) -> Result<Self> {
        if entries.len() != ENTRIES {
            return Err(NnError::invalid_config(format!(
                "activation table has {} entries, expected {ENTRIES}",
                entries.len()
            )));
        }
        if let Some(i) = entries.windows(2).position(|w| w[1] < w[0]) {
            return Err(NnError::invalid_config(format!(
                "activation table decreases at entry {}: {} -> {}",
                i + 1,
                entries[i],
                entries[i + 1]
            )));
        }
        Ok(Self { entries })
    }

    /// Table address for a pre-activation value.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn address(x: Fixed) -> u16 {
        let wide = (i32::from(x.raw()) << PRESCALE_SHIFT) + OFFSET;
        if wide < 0 {
            0
        } else if wide >= SPAN {
            MAX_ADDR
        } else {
            ((wide >> WINDOW_SHIFT) as u16) & MAX_ADDR
        }
    }

    /// Entry at `addr`; only the low 10 address bits are decoded.
    pub fn read(&self, addr: u16) -> Fixed {
        self.entries[usize::from(addr & MAX_ADDR)]
    }

    /// Address and read in one step, without the register stage.
    pub fn lookup(&self, x: Fixed) -> Fixed {
        self.read(Self::address(x))
    }

    /// All entries in address order.
    pub fn entries(&self) -> &[Fixed] {
        &self.entries
    }
}

impl Default for ActivationTable {
    fn default() -> Self {
        Self::sigmoid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: i16 = 2048 / 64;

    #[test]
    fn lower_bound_maps_to_zero() {
        assert_eq!(ActivationTable::address(Fixed::from_f32(-8.0)), 0);
    }

    #[test]
    fn last_step_below_upper_bound_maps_to_last_entry() {
        let x = Fixed::from_raw(8 * 2048 - STEP);
        assert_eq!(ActivationTable::address(x), 1023);
        let below = Fixed::from_raw(8 * 2048 - 2 * STEP);
        assert_eq!(ActivationTable::address(below), 1022);
    }

    #[test]
    fn out_of_range_clamps_instead_of_wrapping() {
        assert_eq!(ActivationTable::address(Fixed::from_f32(8.0)), 1023);
        assert_eq!(ActivationTable::address(Fixed::MAX), 1023);
        assert_eq!(ActivationTable::address(Fixed::from_raw(-8 * 2048 - 1)), 0);
        assert_eq!(ActivationTable::address(Fixed::MIN), 0);
    }

    #[test]
    fn addresses_have_1_64_granularity() {
        assert_eq!(ActivationTable::address(Fixed::ZERO), 512);
        assert_eq!(ActivationTable::address(Fixed::ONE), 576);
        assert_eq!(ActivationTable::address(Fixed::from_f32(0.5)), 544);
        // sub-step changes do not move the address
        assert_eq!(ActivationTable::address(Fixed::from_raw(STEP - 1)), 512);
        assert_eq!(ActivationTable::address(Fixed::from_raw(-1)), 511);
    }

    #[test]
    fn address_is_monotonic() {
        let mut prev = 0;
        for raw in i16::MIN..=i16::MAX {
            let a = ActivationTable::address(Fixed::from_raw(raw));
            assert!(a >= prev, "address decreased at raw {raw}");
            prev = a;
        }
    }

    #[test]
    fn sigmoid_table_contents() {
        let t = ActivationTable::sigmoid();
        assert_eq!(t.entries().len(), 1024);
        assert_eq!(t.read(0).raw(), 1);
        assert_eq!(t.read(512).raw(), 1028);
        assert_eq!(t.read(576).raw(), 1501);
        assert_eq!(t.read(1023).raw(), 2047);
        assert!(t.entries().windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn from_entries_rejects_bad_tables() {
        assert!(ActivationTable::from_entries(vec![Fixed::ZERO; 10]).is_err());
        let mut e = ActivationTable::sigmoid().entries().to_vec();
        e[100] = Fixed::MAX;
        assert!(ActivationTable::from_entries(e).is_err());
        let ok = ActivationTable::from_entries(ActivationTable::sigmoid().entries().to_vec());
        assert!(ok.is_ok());
    }
}
