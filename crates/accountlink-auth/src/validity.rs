//! Validity window expressions.
//!
//! Token lifetimes are configured as short human expressions such as
//! `"+1 day"` or `"+1 Week"`. The ISO-8601 forms `P7D`, `P1W`, `PT24H`,
//! `PT30M` and `PT60S` are accepted as well.

use time::Duration;

use crate::error::TokenError;

/// Default validity of a primary action token.
pub const DEFAULT_VALIDITY: &str = "+1 day";

/// Default validity of an account recovery token.
pub const RECOVERY_VALIDITY: &str = "+1 week";

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_WEEK: i64 = 604_800;

/// Parses a validity expression into a strictly positive duration.
///
/// # Errors
///
/// Returns `InvalidDuration` if the expression cannot be parsed or does not
/// describe a positive amount of time.
pub fn parse_validity(expression: &str) -> Result<Duration, TokenError> {
    let trimmed = expression.trim();
    let duration = if trimmed.starts_with('P') {
        parse_iso(trimmed)
    } else {
        parse_relative(trimmed)
    }
    .ok_or_else(|| TokenError::invalid_duration(expression))?;

    if duration <= Duration::ZERO {
        return Err(TokenError::invalid_duration(expression));
    }
    Ok(duration)
}

fn parse_relative(s: &str) -> Option<Duration> {
    let s = s.strip_prefix('+').unwrap_or(s).trim_start();
    let split = s.find(|c: char| !c.is_ascii_digit())?;
    let (amount, unit) = s.split_at(split);
    let amount: i64 = amount.parse().ok()?;
    unit_duration(unit.trim(), amount)
}

fn unit_duration(unit: &str, amount: i64) -> Option<Duration> {
    let unit = unit.to_ascii_lowercase();
    let seconds_per_unit = match unit.strip_suffix('s').unwrap_or(&unit) {
        "second" | "sec" => 1,
        "minute" | "min" => SECONDS_PER_MINUTE,
        "hour" => SECONDS_PER_HOUR,
        "day" => SECONDS_PER_DAY,
        "week" => SECONDS_PER_WEEK,
        _ => return None,
    };
    scaled(amount, seconds_per_unit)
}

fn parse_iso(s: &str) -> Option<Duration> {
    if let Some(rest) = s.strip_prefix("PT") {
        let (amount, designator) = split_designator(rest)?;
        return match designator {
            'H' => scaled(amount, SECONDS_PER_HOUR),
            'M' => scaled(amount, SECONDS_PER_MINUTE),
            'S' => scaled(amount, 1),
            _ => None,
        };
    }

    let (amount, designator) = split_designator(s.strip_prefix('P')?)?;
    match designator {
        'D' => scaled(amount, SECONDS_PER_DAY),
        'W' => scaled(amount, SECONDS_PER_WEEK),
        _ => None,
    }
}

fn split_designator(s: &str) -> Option<(i64, char)> {
    let designator = s.chars().last()?;
    let amount = s[..s.len() - designator.len_utf8()].parse().ok()?;
    Some((amount, designator))
}

fn scaled(amount: i64, seconds_per_unit: i64) -> Option<Duration> {
    amount.checked_mul(seconds_per_unit).map(Duration::seconds)
}
