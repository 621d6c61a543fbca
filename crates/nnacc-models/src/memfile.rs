// SPDX-License-Identifier: AGPL-3.0-only

//! `.mem` hex files
//!
//! One 16-bit two's-complement word per line as four hex digits. `//`
//! starts a comment that runs to the end of the line; blank lines are
//! ignored.
//!
//! ```text
//! // Layer 0: 784 x 16
//! 0A3F
//! FF12
//! ```

use crate::error::{ModelError, Result};
use nnacc_driver::Fixed;
use std::fmt::Write as _;
use std::path::Path;

/// Parse `.mem` text.
///
/// # Errors
///
/// Returns error naming the first line that is not a 1–4 digit hex word.
pub fn parse_mem(text: &str) -> Result<Vec<Fixed>> {
    let mut values = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let word = line.split("//").next().unwrap_or_default().trim();
        if word.is_empty() {
            continue;
        }
        if word.len() > 4 {
            return Err(ModelError::parse_error(format!(
                "line {}: '{word}' is wider than 16 bits",
                lineno + 1
            )));
        }
        let bits = u16::from_str_radix(word, 16).map_err(|e| {
            ModelError::parse_error(format!("line {}: '{word}': {e}", lineno + 1))
        })?;
        values.push(Fixed::from_bits(bits));
    }
    Ok(values)
}

/// Read and parse a `.mem` file.
///
/// # Errors
///
/// Returns error if the file is missing, unreadable or malformed.
pub fn read_mem(path: &Path) -> Result<Vec<Fixed>> {
    if !path.exists() {
        return Err(ModelError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path)?;
    parse_mem(&text).map_err(|e| match e {
        ModelError::ParseError { reason } => {
            ModelError::parse_error(format!("{}: {reason}", path.display()))
        }
        other => other,
    })
}

/// Format values as `.mem` text, optionally headed by a comment.
pub fn format_mem(values: &[Fixed], comment: Option<&str>) -> String {
    let mut out = String::with_capacity(values.len() * 5 + 64);
    if let Some(c) = comment {
        for line in c.lines() {
            let _ = writeln!(out, "// {line}");
        }
        out.push('\n');
    }
    for v in values {
        let _ = writeln!(out, "{:04X}", v.to_bits());
    }
    out
}

/// Write values as a `.mem` file.
///
/// # Errors
///
/// Returns error if the file cannot be written.
pub fn write_mem(path: &Path, values: &[Fixed], comment: Option<&str>) -> Result<()> {
    std::fs::write(path, format_mem(values, comment))?;
    Ok(())
}
