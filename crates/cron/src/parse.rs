//! Parsing for human-written schedules.

use crate::{Error, Result, schedule::parse_cron, types::JobSchedule};

/// Parse a human-friendly duration string into milliseconds.
///
/// Supported suffixes: `s` (seconds), `m` (minutes), `h` (hours), `d` (days).
/// Examples: `"30s"`, `"5m"`, `"2h"`, `"1d"`.
pub fn parse_duration_ms(input: &str) -> Result<u64> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::invalid_schedule(input, "empty duration string"));
    }

    let Some(i) = input.find(|c: char| c.is_alphabetic()) else {
        return Err(Error::invalid_schedule(
            input,
            "duration missing unit suffix (s/m/h/d)",
        ));
    };
    let (num_str, suffix) = (input[..i].trim(), &input[i..]);

    let value: u64 = num_str
        .parse()
        .map_err(|_| Error::invalid_schedule(input, format!("invalid number '{num_str}'")))?;
    if value == 0 {
        return Err(Error::invalid_schedule(input, "duration must be > 0"));
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => {
            return Err(Error::invalid_schedule(
                input,
                format!("unknown duration suffix '{suffix}' (expected s/m/h/d)"),
            ));
        },
    };
    value
        .checked_mul(unit_ms)
        .ok_or_else(|| Error::invalid_schedule(input, "duration too large"))
}

/// Parse a poll schedule: `"every 5m"`, `"@every 5m"`, a bare duration such
/// as `"30s"`, or a 5/6/7-field cron expression evaluated in `tz`.
pub fn parse_schedule(input: &str, tz: Option<&str>) -> Result<JobSchedule> {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();
    if let Some(rest) = lower
        .strip_prefix("@every")
        .or_else(|| lower.strip_prefix("every"))
    {
        return Ok(JobSchedule::Every {
            every_ms: parse_duration_ms(rest)?,
        });
    }
    if !trimmed.contains(char::is_whitespace) {
        return Ok(JobSchedule::Every {
            every_ms: parse_duration_ms(trimmed)?,
        });
    }

    parse_cron(trimmed)?;
    if let Some(tz_name) = tz {
        tz_name
            .parse::<chrono_tz::Tz>()
            .map_err(|_| Error::unknown_timezone(tz_name))?;
    }
    Ok(JobSchedule::Cron {
        expr: trimmed.to_string(),
        tz: tz.map(str::to_string),
    })
}
