//! Credential login.
//!
//! Accounts without a password can only sign in through a `user_login`
//! link. Accounts whose registration was never confirmed are refused.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::passwords::verify_password;
use crate::state::AppState;
use crate::store::AccountStore;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email address.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub principal_id: u64,
    /// The caller should establish a session for `principal_id`.
    pub login: bool,
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthenticated("Invalid credentials")
}

/// `POST /login`
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let record = state
        .accounts
        .find_by_login(&request.login)
        .await?
        .ok_or_else(invalid_credentials)?;
    let hash = record.password_hash.clone().ok_or_else(invalid_credentials)?;

    let password = request.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !matches {
        tracing::debug!(principal_id = record.id, "Credential login refused");
        return Err(invalid_credentials());
    }

    if !record.active {
        return Err(ApiError::forbidden(
            "This account is not activated yet, follow the link in your confirmation email",
        ));
    }

    tracing::info!(principal_id = record.id, "Credential login");
    Ok(Json(LoginResponse {
        principal_id: record.id,
        login: true,
    }))
}
