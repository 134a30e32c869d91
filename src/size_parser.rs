// src/size_parser.rs
//
// `--block-size` values: a plain byte count or a number with a unit, e.g.
// `4096`, `64KiB`, `1.5MiB`, `4k`. Units are case-insensitive. `K`, `M`, `G`
// are powers of 10 and the `i` forms are powers of 2.

use crate::config::ConfigError;

/// Checked longest first so `kib` is never read as `b` with a `ki` number.
const UNITS: &[(&str, u64)] = &[
    ("kib", 1 << 10),
    ("mib", 1 << 20),
    ("gib", 1 << 30),
    ("kb", 1_000),
    ("mb", 1_000_000),
    ("gb", 1_000_000_000),
    ("ki", 1 << 10),
    ("mi", 1 << 20),
    ("gi", 1 << 30),
    ("k", 1_000),
    ("m", 1_000_000),
    ("g", 1_000_000_000),
    ("b", 1),
];

/// Parse a size into bytes. Fractional values round to the nearest byte.
pub fn parse_size(input: &str) -> Result<u64, ConfigError> {
    let text = input.trim();
    let invalid = |why: &str| ConfigError::InvalidSize(format!("{} in '{}'", why, text));

    let lower = text.to_ascii_lowercase();
    let (digits, multiplier) = UNITS
        .iter()
        .find_map(|&(unit, mult)| lower.strip_suffix(unit).map(|rest| (rest, mult)))
        .unwrap_or((lower.as_str(), 1));

    let digits = digits.trim_end();
    if digits.is_empty() {
        return Err(invalid("missing number"));
    }
    if !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(invalid("unrecognized unit"));
    }

    if let Ok(whole) = digits.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("value overflows"));
    }

    let value: f64 = digits.parse().map_err(|_| invalid("malformed number"))?;
    let bytes = (value * multiplier as f64).round();
    if bytes >= u64::MAX as f64 {
        return Err(invalid("value overflows"));
    }
    Ok(bytes as u64)
}
