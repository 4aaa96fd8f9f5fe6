pub mod container;
pub mod memory;
pub mod message;
pub mod schedule;
pub mod subagent;
pub mod web;

pub use schedule::ScheduleReloader;
