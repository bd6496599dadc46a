//! Lenient scalar parsing for upstream payloads
//!
//! The upstream API is loosely typed: counts arrive as JSON numbers or as
//! numeric strings, booleans as bools or as "yes"/"no" strings, and fields
//! come and go between API versions. These helpers coerce such values into
//! typed options. Anything that does not coerce cleanly becomes `None`,
//! never a default value.

use serde_json::Value;

/// Coerce a JSON value into a non-negative integer count.
///
/// Accepts JSON integers, integral floats (`700.0`), and strings holding
/// either ("700", " 700.0 "). Negative values, fractional values, and
/// anything else map to `None`.
pub fn parse_count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Some(u);
            }
            // Integral floats only; fractional counts are not counts.
            if let Some(f) = n.as_f64() {
                if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
                    return Some(f as u64);
                }
            }
            None
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(u) = s.parse::<u64>() {
                return Some(u);
            }
            if let Ok(f) = s.parse::<f64>() {
                if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
                    return Some(f as u64);
                }
            }
            None
        }
        _ => None,
    }
}

/// Coerce a JSON value into a boolean.
///
/// Accepts JSON bools and the usual string/number spellings
/// ("1", "true", "yes", "on" / "0", "false", "no", "off").
pub fn parse_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => parse_bool_str(s),
        _ => None,
    }
}

/// Parse a boolean from its common string spellings.
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Case-insensitive string comparison against an optional filter.
///
/// A missing filter matches everything; a present filter requires a present,
/// equal (ignoring case) value.
pub fn str_matches(value: Option<&str>, filter: Option<&str>) -> bool {
    match filter {
        None | Some("") => true,
        Some(f) => match value {
            Some(v) => v.eq_ignore_ascii_case(f),
            None => false,
        },
    }
}
