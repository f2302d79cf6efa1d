use axum::{extract::State, Json};

use super::AppState;
use crate::api::models::{PersistenceStatus, StatusResponse};

/// Liveness plus whether the document store answered last time we asked.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".into(),
        service: env!("CARGO_PKG_NAME").into(),
        version: env!("CARGO_PKG_VERSION").into(),
        persistence: PersistenceStatus {
            backend: state.store.backend().into(),
            connected: state.store.is_connected(),
        },
    })
}
