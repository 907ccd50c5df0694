//! Change log API endpoints
//!
//! `GET` pulls changes at or after a cursor, `POST` appends a batch. Both
//! are mounted at `/changes` and again under `/v1/sync`.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};

use crate::auth::require_bearer;
use crate::error::Result;
use crate::state::AppState;
use crate::sync::{Change, PullQuery, PushResponse};

/// Create the changes router
///
/// The push handler sits behind the bearer gate when a verifier is configured.
pub fn router(state: &AppState) -> Router<AppState> {
    let mut push = post(push_changes);
    if let Some(verifier) = state.verifier() {
        push = push.route_layer(middleware::from_fn_with_state(verifier, require_bearer));
    }

    Router::new().route("/changes", get(pull_changes).merge(push))
}

/// Pull changes since the `since` cursor
///
/// The query is read as raw pairs so a repeated `since` uses its first value
/// instead of failing the request.
async fn pull_changes(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Change>>> {
    let query = PullQuery::from_pairs(pairs);
    let changes = state.sync().pull(query.since.as_deref()).await?;
    Ok(Json(changes))
}

/// Push a batch of changes
///
/// The body is decoded by hand so any malformed payload maps to 400, whatever
/// its Content-Type. A JSON `null` is an empty batch.
async fn push_changes(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<PushResponse>)> {
    let changes: Option<Vec<Change>> = serde_json::from_slice(&body)?;
    let received = state.sync().push(changes.unwrap_or_default()).await?;
    Ok((StatusCode::ACCEPTED, Json(PushResponse::ok(received))))
}
