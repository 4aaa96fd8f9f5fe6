use axum::extract::State;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> axum::Json<Value> {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    axum::Json(json!({
                "status": if db_ok { "ok" } else { "degraded" },
                "version": env!("CARGO_PKG_VERSION"),
                "db": db_ok,
    }))
}
