use bytes::Bytes;

use crate::{commands::CommandError, resp::RespValue};

/// Parses a signed decimal argument the way the server does: no leading
/// `+`, no surrounding whitespace.
pub fn parse_integer(argument: &[u8]) -> Result<i64, CommandError> {
    let text = std::str::from_utf8(argument).map_err(|_| CommandError::NotAnInteger)?;
    if text.starts_with('+') || text.trim() != text {
        return Err(CommandError::NotAnInteger);
    }
    text.parse::<i64>().map_err(|_| CommandError::NotAnInteger)
}

/// Parses a float argument. Accepts `inf`, `+inf` and `-inf`, rejects NaN.
pub fn parse_float(argument: &[u8]) -> Result<f64, CommandError> {
    let text = std::str::from_utf8(argument).map_err(|_| CommandError::NotAFloat)?;
    let value = match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        _ if text.trim() != text || text.is_empty() => return Err(CommandError::NotAFloat),
        _ => text.parse::<f64>().map_err(|_| CommandError::NotAFloat)?,
    };

    if value.is_nan() {
        return Err(CommandError::NotAFloat);
    }
    Ok(value)
}

/// Upper-cased argument for matching option keywords such as `EX` or `NX`.
pub fn keyword(argument: &[u8]) -> String {
    String::from_utf8_lossy(argument).to_ascii_uppercase()
}

pub fn lossy(argument: &[u8]) -> String {
    String::from_utf8_lossy(argument).into_owned()
}

/// Formats a score the way replies carry it: integral values without a
/// fraction, infinities as `inf`/`-inf`.
pub fn format_float(value: f64) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e17 {
        return format!("{}", value as i64);
    }
    format!("{}", value)
}

pub fn bulk_or_null(value: Option<&Bytes>) -> RespValue {
    match value {
        Some(data) => RespValue::BulkString(data.clone()),
        None => RespValue::Null,
    }
}

/// Resolves a `start`/`stop` pair (negative values count from the end)
/// against a collection of `len` elements.
///
/// Returns the inclusive index range, or `None` when it selects nothing.
pub fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    if len == 0 {
        return None;
    }

    let start = if start < 0 { len + start } else { start }.max(0);
    let stop = if stop < 0 { len + stop } else { stop }.min(len - 1);

    if start >= len || start > stop {
        return None;
    }

    Some((start as usize, stop as usize))
}

/// Resolves a single possibly-negative index.
pub fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { len + index } else { index };
    (0..len).contains(&index).then_some(index as usize)
}
