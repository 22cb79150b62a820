//! Human-friendly duration values for lifecycle thresholds.
//!
//! Thresholds are stored as milliseconds but may be written either as a
//! plain integer (`86400000`) or as a unit string (`"1d"`, `"1d12h"`,
//! `"90s"`, `"250ms"`).

use crate::core::{CullError, Millis, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer};

lazy_static! {
    static ref DURATION_FULL: Regex =
        Regex::new(r"^(?:\d+\s*(?:ms|s|m|h|d|w)\s*)+$").expect("valid duration pattern");
    static ref DURATION_PART: Regex =
        Regex::new(r"(\d+)\s*(ms|s|m|h|d|w)").expect("valid duration pattern");
}

fn unit_ms(unit: &str) -> Millis {
    match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 604_800_000,
        _ => unreachable!("unit is constrained by DURATION_PART"),
    }
}

/// Parses a duration string into milliseconds.
///
/// A bare number is taken as milliseconds.
pub fn parse_duration_ms(input: &str) -> Result<Millis> {
    let text = input.trim();
    if text.is_empty() {
        return Err(CullError::InvalidConfig("empty duration".to_string()));
    }

    if let Ok(ms) = text.parse::<Millis>() {
        return Ok(ms);
    }

    if !DURATION_FULL.is_match(text) {
        return Err(CullError::InvalidConfig(format!(
            "unrecognised duration '{}'",
            input
        )));
    }

    let mut total: Millis = 0;
    for part in DURATION_PART.captures_iter(text) {
        let amount: Millis = part[1].parse().map_err(|_| {
            CullError::InvalidConfig(format!("duration '{}' is out of range", input))
        })?;
        total = amount
            .checked_mul(unit_ms(&part[2]))
            .and_then(|ms| total.checked_add(ms))
            .ok_or_else(|| {
                CullError::InvalidConfig(format!("duration '{}' is out of range", input))
            })?;
    }
    Ok(total)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Millis(i64),
    Text(String),
}

/// `deserialize_with` helper accepting either integer milliseconds or a unit string.
pub fn deserialize_ms<'de, D>(deserializer: D) -> std::result::Result<Millis, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Millis(ms) => Ok(ms),
        RawDuration::Text(text) => parse_duration_ms(&text).map_err(serde::de::Error::custom),
    }
}
