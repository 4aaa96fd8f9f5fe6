//! Cron pattern parsing and next-fire computation.
//!
//! Wraps the `cron` crate's five/six-field expressions behind a single
//! `next_fire_after` call so the rest of this crate never touches
//! `cron::Schedule` directly. Bootstrap and CRUD reload both funnel through
//! `parse`, so an invalid pattern is rejected the same way in both places
//! invalid patterns log a warning and leave the schedule disabled.

use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::error::{Result, SchedulerError};

pub fn parse(pattern: &str) -> Result<cron::Schedule> {
    cron::Schedule::from_str(pattern).map_err(|e| SchedulerError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
    })
}

/// First occurrence strictly after `from`, using wall-clock UTC (/// "absolute wall-clock is used only for the cron next-fire calculation").
pub fn next_fire_after(schedule: &cron::Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&from).next()
}
