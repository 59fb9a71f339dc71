use accountlink_notifications::Notice;
use axum::{
    Json,
    extract::{Path, State},
};

use crate::error::ApiError;
use crate::http::extract::ActingPrincipal;
use crate::state::AppState;

/// `GET /notices/{id}`: drains the pending notices of the acting principal.
pub async fn notices_handler(
    State(state): State<AppState>,
    ActingPrincipal(acting_id): ActingPrincipal,
    Path(id): Path<u64>,
) -> Result<Json<Vec<Notice>>, ApiError> {
    if acting_id != id {
        return Err(ApiError::forbidden("You can only read your own notices"));
    }
    Ok(Json(state.notifier.take(id)))
}
