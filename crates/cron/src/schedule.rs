//! Next-run computation for both schedule kinds.

use {
    chrono::{DateTime, Utc},
    cron::Schedule,
};

use crate::{Error, Result, types::JobSchedule};

/// Parse a cron expression, accepting the 5-field form by padding it to the
/// 7 fields (sec min hour dom month dow year) the `cron` crate wants.
pub fn parse_cron(expr: &str) -> Result<Schedule> {
    expr.parse::<Schedule>().or_else(|_| {
        format!("0 {expr} *")
            .parse::<Schedule>()
            .map_err(|source| Error::InvalidCron {
                expr: expr.to_string(),
                source,
            })
    })
}

/// Next run time (epoch millis) strictly after `now_ms`.
///
/// Returns `None` if a cron expression has no future occurrence.
pub fn compute_next_run(schedule: &JobSchedule, now_ms: u64) -> Result<Option<u64>> {
    match schedule {
        JobSchedule::Every { every_ms } => {
            if *every_ms == 0 {
                return Err(Error::invalid_schedule("every 0", "interval must be > 0"));
            }
            Ok(Some(now_ms.saturating_add(*every_ms)))
        },
        JobSchedule::Cron { expr, tz } => {
            let schedule = parse_cron(expr)?;
            let now_dt = DateTime::from_timestamp_millis(now_ms as i64).unwrap_or(DateTime::UNIX_EPOCH);

            let next = match tz {
                Some(tz_name) => {
                    let tz: chrono_tz::Tz = tz_name
                        .parse()
                        .map_err(|_| Error::unknown_timezone(tz_name))?;
                    schedule
                        .after(&now_dt.with_timezone(&tz))
                        .next()
                        .map(|dt| dt.timestamp_millis() as u64)
                },
                None => schedule
                    .after(&now_dt)
                    .next()
                    .map(|dt: DateTime<Utc>| dt.timestamp_millis() as u64),
            };
            Ok(next)
        },
    }
}

/// Next run after the one due at `previous`.
///
/// Cron occurrences are counted from `max(now_ms, previous)`, so a timer
/// that wakes slightly before the wall clock reaches `previous` does not
/// yield the same occurrence twice. Intervals always count from `now_ms`.
pub fn compute_following_run(
    schedule: &JobSchedule,
    now_ms: u64,
    previous: Option<u64>,
) -> Result<Option<u64>> {
    let anchor = match schedule {
        JobSchedule::Cron { .. } => previous.map_or(now_ms, |p| p.max(now_ms)),
        JobSchedule::Every { .. } => now_ms,
    };
    compute_next_run(schedule, anchor)
}
