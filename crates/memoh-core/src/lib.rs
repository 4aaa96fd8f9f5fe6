//! `memoh-core` — identifiers, error taxonomy, and configuration shared by
//! every other crate in the workspace.
//!
//! Nothing in this crate talks to a database or the network; it exists so
//! leaf crates (persistence, channels, agent, …) agree on the same `BotId`,
//! the same `MemohError`, and the same config shape without depending on
//! each other.

pub mod config;
pub mod error;
pub mod types;

pub use config::MemohConfig;
pub use error::{ErrorKind, MemohError, Result};
