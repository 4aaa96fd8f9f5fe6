//! POST /auth/login — username/password in, bearer JWT out.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::app::{ApiError, AppState};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<memoh_users::LoginResponse>, ApiError> {
    let resp = state
    .auth
    .login(&state.pool, &req.username, &req.password)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(resp))
}
