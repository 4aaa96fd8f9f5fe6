//! `memoh-scheduler` — cron-driven job engine.
//!
//! One Tokio timer per enabled [`memoh_db::model::Schedule`] row, firing a
//! synthetic agent turn through [`memoh_agent::TurnEngine`] when its cron
//! pattern next matches. `max_calls` is enforced by re-reading the freshest
//! row at fire time and incrementing `current_calls` in the same statement
//! that records the run, so two racing processes can't both fire past the
//! ceiling.

pub mod engine;
pub mod error;
pub mod pattern;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
