//! Token confirmation handlers.
//!
//! `GET /confirm/{action}` checks a link and returns what the confirmation
//! page should show. `POST /confirm/{action}` consumes the token and
//! performs the action against the account store. Every check that can
//! still reject the request runs before the token is consumed.

use accountlink_auth::{Action, PrincipalStore, TokenClaims, TokenError};
use accountlink_notifications::{NoticeKind, Notifier};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::http::issue::hash_in_background;
use crate::passwords::check_password_strength;
use crate::state::AppState;
use crate::store::{AccountStore, StoreError};

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub token: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Data for the confirmation page of a still-valid link.
#[derive(Debug, Serialize)]
pub struct ConfirmationPage {
    pub action: Action,
    pub username: String,
    pub title: &'static str,
    pub description: &'static str,
    pub button_label: &'static str,
    pub requires_password: bool,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub action: Action,
    pub principal_id: u64,
    /// The caller should establish a session for `principal_id`.
    pub login: bool,
    pub notice: String,
}

fn requires_password(action: Action) -> bool {
    matches!(action, Action::PasswordReset | Action::PasswordChange)
}

/// `GET /confirm/{action}?token=...`
pub async fn show_confirmation_handler(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<ConfirmationPage>, ApiError> {
    let action: Action = action.parse()?;
    let claims = state
        .verifier
        .verify_unspent(&query.token, Some(action))
        .await?;
    let descriptor = state.issuer.dispatcher().describe(action);

    Ok(Json(ConfirmationPage {
        action,
        username: claims.username,
        title: descriptor.title,
        description: descriptor.description,
        button_label: descriptor.button_label,
        requires_password: requires_password(action),
    }))
}

/// `POST /confirm/{action}`
pub async fn confirm_handler(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let action: Action = action.parse()?;

    // Reject a missing or weak password before the token is spent.
    let password = if requires_password(action) {
        let password = request
            .password
            .ok_or_else(|| ApiError::validation("A new password is required"))?;
        check_password_strength(&password).map_err(ApiError::validation)?;
        Some(password)
    } else {
        None
    };

    let preview = state
        .verifier
        .verify_unspent(&request.token, Some(action))
        .await?;
    let live = state
        .accounts
        .find_by_id(preview.id)
        .await?
        .ok_or_else(|| ApiError::not_found("The account of this link no longer exists"))?;

    if action.is_identity_sensitive() && live.email() != preview.email {
        tracing::warn!(
            principal_id = preview.id,
            action = %action,
            "Token snapshot email no longer matches the account"
        );
        return Err(
            TokenError::forbidden("this link was issued for a different email address").into(),
        );
    }

    if action == Action::AccountRecovery
        && let Some(holder) = state.accounts.find_by_email(&preview.email).await?
        && holder.id() != live.id()
    {
        return Err(StoreError::Duplicate { field: "email" }.into());
    }

    let claims = state.verifier.consume(&request.token, Some(action)).await?;
    let notice = perform(&state, &claims, password).await?;

    tracing::info!(
        principal_id = claims.id,
        action = %action,
        login = claims.login,
        "Account action confirmed"
    );

    if action != Action::AccountDelete {
        state
            .notifier
            .notify(&live, NoticeKind::Success, notice)
            .await?;
    }

    Ok(Json(ConfirmResponse {
        action,
        principal_id: claims.id,
        login: claims.login && action != Action::AccountDelete,
        notice: notice.to_string(),
    }))
}

/// Applies the confirmed action and returns the acknowledgment text.
async fn perform(
    state: &AppState,
    claims: &TokenClaims,
    password: Option<String>,
) -> Result<&'static str, ApiError> {
    let id = claims.id;
    match claims.action {
        Action::AccountDelete => {
            state.accounts.delete(id).await?;
            Ok("Your account was deleted.")
        }
        Action::AccountCreate => {
            state.accounts.activate(id).await?;
            Ok("Your account is now active.")
        }
        Action::PasswordReset | Action::PasswordChange => {
            let password =
                password.ok_or_else(|| ApiError::validation("A new password is required"))?;
            let hash = hash_in_background(password).await?;
            state.accounts.set_password_hash(id, hash).await?;
            Ok("Your password was changed.")
        }
        Action::AccountRecovery => {
            state.accounts.update_email(id, &claims.email).await?;
            Ok("Your previous email address was restored.")
        }
        Action::UserLogin => Ok("You are now logged in."),
    }
}
