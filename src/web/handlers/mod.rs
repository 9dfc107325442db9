pub mod media;
pub mod realtime;
pub mod text;

use crate::services::search;
use crate::web::error::{json_error, AppResult};
use crate::web::state::AppState;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceExt;

/// GET /health
pub async fn health() -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// GET /api/search?q=
pub async fn search_library(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> AppResult<Response> {
    let results = search::search(&state.db, &params.q)?;
    Ok(Json(results).into_response())
}

/// Unknown API paths answer with JSON; everything else goes to the client
/// build when one is configured.
pub async fn fallback(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    if request.uri().path().starts_with("/api") {
        return json_error(StatusCode::NOT_FOUND, "API route not found");
    }

    match &state.client {
        Some(client) => client.clone().oneshot(request).await.into_response(),
        None => json_error(StatusCode::NOT_FOUND, "Not found"),
    }
}
