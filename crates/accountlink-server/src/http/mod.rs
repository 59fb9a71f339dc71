//! Axum routes.
//!
//! ```text
//! POST /register
//! POST /login
//! POST /password-reset
//! POST /security/email-change/{id}
//! POST /security/{action}/{id}
//! GET  /confirm/{action}?token=...
//! POST /confirm/{action}
//! GET  /notices/{id}
//! GET  /healthz
//! ```

pub mod confirm;
pub mod extract;
pub mod issue;
pub mod login;
pub mod notices;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use confirm::{confirm_handler, show_confirmation_handler};
pub use extract::{ActingPrincipal, PRINCIPAL_HEADER};
pub use issue::{
    email_change_handler, password_reset_handler, register_handler, security_action_handler,
};
pub use login::login_handler;
pub use notices::notices_handler;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/password-reset", post(password_reset_handler))
        .route("/security/email-change/{id}", post(email_change_handler))
        .route("/security/{action}/{id}", post(security_action_handler))
        .route(
            "/confirm/{action}",
            get(show_confirmation_handler).post(confirm_handler),
        )
        .route("/notices/{id}", get(notices_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
