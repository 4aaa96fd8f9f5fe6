//! `memoh-router` — the inbound router : turns channel-adapter
//! traffic into persisted conversations and best-effort agent dispatch.

pub mod access;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod router;

pub use access::{require_participant, resolve as resolve_access, NotParticipant};
pub use dispatch::{DispatchJob, DispatchPool};
pub use error::{Result, RouterError};
pub use hub::EventHub;
pub use router::{BotRouter, InboundRouter};
