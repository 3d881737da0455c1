//! Human-friendly durations for `--duration`.
//!
//! Accepts plain seconds (`95`, `12.5`) or a chain of `<number><unit>` pairs
//! (`30s`, `1m30s`, `1h 2m 3.5s`) with units `h`, `m`, `s` and `ms`. Each
//! unit may appear once.

/// Why a duration string was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DurationParseError {
    #[error("duration cannot be empty")]
    Empty,
    #[error("expected a number at position {}", .index + 1)]
    ExpectedNumber { index: usize },
    #[error("expected a unit (h, m, s, ms) at position {}", .index + 1)]
    ExpectedUnit { index: usize },
    #[error("unknown unit '{found}' at position {}", .index + 1)]
    UnknownUnit { index: usize, found: String },
    #[error("unit '{0}' appears more than once")]
    DuplicateUnit(&'static str),
    #[error("duration must be greater than zero")]
    Zero,
    #[error("duration is too large")]
    TooLarge,
}

const UNITS: [(&str, f64); 4] = [("ms", 0.001), ("h", 3600.0), ("m", 60.0), ("s", 1.0)];

/// Parse `value` into seconds.
pub fn parse_duration(value: &str) -> Result<f64, DurationParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }

    if let Ok(secs) = trimmed.parse::<f64>() {
        return finish(secs);
    }

    let bytes = trimmed.as_bytes();
    let mut index = 0;
    let mut seen = [false; UNITS.len()];
    let mut total = 0.0;

    while index < bytes.len() {
        skip_separators(bytes, &mut index);
        if index >= bytes.len() {
            break;
        }

        let start = index;
        while index < bytes.len() && (bytes[index].is_ascii_digit() || bytes[index] == b'.') {
            index += 1;
        }
        let number: f64 = trimmed[start..index]
            .parse()
            .map_err(|_| DurationParseError::ExpectedNumber { index: start })?;

        skip_separators(bytes, &mut index);
        let unit_start = index;
        while index < bytes.len() && bytes[index].is_ascii_alphabetic() {
            index += 1;
        }
        let symbol = &trimmed[unit_start..index];
        if symbol.is_empty() {
            return Err(DurationParseError::ExpectedUnit { index: unit_start });
        }

        let Some(pos) = UNITS.iter().position(|(s, _)| *s == symbol) else {
            return Err(DurationParseError::UnknownUnit {
                index: unit_start,
                found: symbol.to_string(),
            });
        };
        if std::mem::replace(&mut seen[pos], true) {
            return Err(DurationParseError::DuplicateUnit(UNITS[pos].0));
        }
        total += number * UNITS[pos].1;
    }

    finish(total)
}

fn finish(secs: f64) -> Result<f64, DurationParseError> {
    if !secs.is_finite() {
        return Err(DurationParseError::TooLarge);
    }
    if secs <= 0.0 {
        return Err(DurationParseError::Zero);
    }
    Ok(secs)
}

fn skip_separators(bytes: &[u8], index: &mut usize) {
    while *index < bytes.len() && (bytes[*index] == b'_' || bytes[*index].is_ascii_whitespace()) {
        *index += 1;
    }
}
