//! Typed Postgres repositories for every entity in the data model.
//!
//! Each submodule owns one entity group and exposes plain `async fn`s over a
//! shared [`sqlx::PgPool`] — no raw SQL leaks past this crate's boundary, and
//! callers never see `sqlx::Error` directly (see [`error::DbError`]).

pub mod bots;
pub mod containers;
pub mod conversations;
pub mod error;
pub mod identities;
pub mod messages;
pub mod model;
pub mod providers;
pub mod routes;
pub mod schedules;
pub mod search_providers;
pub mod subagents;
pub mod users;

pub use error::{DbError, Result};

use sqlx::postgres::{PgPoolOptions, Postgres};
use sqlx::Pool;

pub type PgPool = Pool<Postgres>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Opens a connection pool and runs pending migrations. Call once at
/// process startup; every crate downstream just takes `&PgPool`.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
    .max_connections(max_connections)
    .connect(database_url)
    .await?;
    MIGRATOR.run(&pool).await?;
    tracing::info!("memoh-db: connected and migrated");
    Ok(pool)
}

/// Test-only helper, kept `pub` (not `#[cfg(test)]`) so it's reachable from
/// `tests/*.rs` integration tests in this crate as well as unit tests.
pub mod test_support {
    //! Spins up a pool against a scratch database for integration tests.
    //! Tests read `MEMOH_TEST_DATABASE_URL`; they skip (rather than fail)
    //! when it isn't set, so `cargo test` stays usable without Postgres.
    use super::*;

    pub async fn scratch_pool() -> Option<PgPool> {
        let url = std::env::var("MEMOH_TEST_DATABASE_URL").ok()?;
        let pool = connect(&url, 5).await.expect("connect to scratch db");
        Some(pool)
    }
}
