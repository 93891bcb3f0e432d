//! Rules every sync configuration must satisfy

use crate::error::ValidationError;
use crate::Config;
use std::fmt::Display;
use std::ops::RangeInclusive;

pub const HEARTBEAT_RANGE_MS: RangeInclusive<u64> = 100..=60_000;
pub const POLL_RANGE_MS: RangeInclusive<u64> = 100..=60_000;
pub const WIDENING_RANGE_MS: RangeInclusive<u64> = 0..=5_000;
pub const STREAM_LIMIT_RANGE: RangeInclusive<u32> = 1..=8;

/// Returns every rule `config` breaks, in file order
pub fn check(config: &Config) -> Vec<ValidationError> {
    let sync = &config.sync;
    let mut problems = Vec::new();

    within(&mut problems, "sync.heartbeat_interval_ms", sync.heartbeat_interval_ms, &HEARTBEAT_RANGE_MS);
    within(&mut problems, "sync.poll_interval_ms", sync.poll_interval_ms, &POLL_RANGE_MS);
    // the poll is the backstop between heartbeats
    if sync.poll_interval_ms > sync.heartbeat_interval_ms {
        problems.push(ValidationError::new(
            "sync.poll_interval_ms",
            format!(
                "is {}, longer than sync.heartbeat_interval_ms ({})",
                sync.poll_interval_ms, sync.heartbeat_interval_ms
            ),
        ));
    }
    within(&mut problems, "sync.tolerance_widening_ms", sync.tolerance_widening_ms, &WIDENING_RANGE_MS);
    within(
        &mut problems,
        "sync.max_broadband_streams_with_broadcast",
        sync.max_broadband_streams_with_broadcast,
        &STREAM_LIMIT_RANGE,
    );
    within(
        &mut problems,
        "sync.max_broadband_streams_no_broadcast",
        sync.max_broadband_streams_no_broadcast,
        &STREAM_LIMIT_RANGE,
    );

    problems
}

fn within<T>(problems: &mut Vec<ValidationError>, field: &'static str, value: T, range: &RangeInclusive<T>)
where
    T: PartialOrd + Display,
{
    if !range.contains(&value) {
        problems.push(ValidationError::new(
            field,
            format!("is {}, expected {}..={}", value, range.start(), range.end()),
        ));
    }
}
