//! One module per HTTP resource, mirroring `memoh-mcp::tools`' one-family-
//! per-file layout. `app.rs` wires every handler here onto the axum
//! `Router`.

pub mod auth;
pub mod bots;
pub mod chat;
pub mod health;
pub mod mcp_stdio;
pub mod messages;
pub mod providers;
pub mod schedule;
pub mod search_providers;
pub mod settings;
pub mod subagents;
pub mod web;
pub mod webhooks;
