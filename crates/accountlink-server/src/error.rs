//! HTTP error responses.
//!
//! Every failure leaves a handler as `{ "error": code, "message": text }`.
//! Server-side failures keep their details in the log and send a generic
//! message.

use accountlink_auth::TokenError;
use accountlink_notifications::NotificationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Unauthenticated { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ApiError {
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = error_details(&self);

        if status.is_server_error() {
            tracing::error!(error = %self, code, "Request failed");
        } else {
            tracing::debug!(reason = code, "Request rejected");
        }

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

/// Returns (HTTP status, error code, client-facing message).
fn error_details(error: &ApiError) -> (StatusCode, &'static str, String) {
    match error {
        ApiError::Token(e) => token_error_details(e),
        ApiError::Notification(e) => notification_error_details(e),
        ApiError::Store(e) => match e {
            StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", e.to_string()),
            StoreError::Duplicate { .. } => (StatusCode::CONFLICT, "duplicate", e.to_string()),
            StoreError::Invalid { message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_failed",
                message.clone(),
            ),
        },
        ApiError::NotFound { message } => (StatusCode::NOT_FOUND, "not_found", message.clone()),
        ApiError::BadRequest { message } => {
            (StatusCode::BAD_REQUEST, "bad_request", message.clone())
        }
        ApiError::Validation { message } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_failed",
            message.clone(),
        ),
        ApiError::Unauthenticated { message } => {
            (StatusCode::UNAUTHORIZED, "unauthenticated", message.clone())
        }
        ApiError::Forbidden { message } => (StatusCode::FORBIDDEN, "forbidden", message.clone()),
        ApiError::Internal { .. } => internal_details("internal_error"),
    }
}

fn token_error_details(error: &TokenError) -> (StatusCode, &'static str, String) {
    let status = match error {
        TokenError::InvalidPrincipal { .. }
        | TokenError::InvalidDuration { .. }
        | TokenError::UnknownAction { .. }
        | TokenError::Malformed { .. }
        | TokenError::NotYetValid
        | TokenError::ActionMismatch { .. } => StatusCode::BAD_REQUEST,
        TokenError::Expired | TokenError::AlreadyConsumed => StatusCode::GONE,
        TokenError::Forbidden { .. } => StatusCode::FORBIDDEN,
        TokenError::Encoding { .. }
        | TokenError::Storage { .. }
        | TokenError::Configuration { .. } => return internal_details(error.code()),
    };
    (status, error.code(), user_message(error))
}

/// Messaging per rejection kind. Codec details stay out of responses.
fn user_message(error: &TokenError) -> String {
    match error {
        TokenError::Malformed { .. } => "This link is invalid.".into(),
        TokenError::NotYetValid => "This link is not valid yet.".into(),
        TokenError::Expired => "This link has expired, please request a new one.".into(),
        TokenError::AlreadyConsumed => "This link has already been used.".into(),
        TokenError::ActionMismatch { .. } => "This link cannot be used for this action.".into(),
        other => other.to_string(),
    }
}

fn notification_error_details(error: &NotificationError) -> (StatusCode, &'static str, String) {
    match error {
        NotificationError::InvalidRecipient(_) => (
            StatusCode::BAD_REQUEST,
            "invalid_recipient",
            error.to_string(),
        ),
        NotificationError::SendFailed(_) => (
            StatusCode::BAD_GATEWAY,
            "delivery_failed",
            "The email could not be delivered, please try again later.".into(),
        ),
        _ => internal_details("internal_error"),
    }
}

fn internal_details(code: &'static str) -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        code,
        "An internal error occurred.".into(),
    )
}
