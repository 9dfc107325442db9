use crate::models::{ChangeEvent, Collection, TextItem, TextPatch};
use crate::services::{text, ServiceError};
use crate::web::error::AppResult;
use crate::web::extractors::json_body;
use crate::web::handlers::media::{RenameBody, ReorderBody};
use crate::web::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateTextBody {
    pub name: String,
    #[serde(default)]
    pub content: String,
}

fn item_response(item: &TextItem) -> Response {
    Json(serde_json::json!({ "success": true, "item": item })).into_response()
}

/// GET /api/text
pub async fn list(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    let items = text::list_text(&state.db)?;
    Ok(Json(items).into_response())
}

/// POST /api/text
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTextBody>, JsonRejection>,
) -> AppResult<Response> {
    let body = json_body(payload, "Name is required")?;
    let _writes = state.write_lock.lock().await;
    let item = text::create_text(&state.db, &body.name, &body.content)?;

    state.broadcaster.publish(ChangeEvent::text_inserted(&item));
    Ok(item_response(&item))
}

/// GET /api/text/:id
pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> AppResult<Response> {
    let item = text::get_text(&state.db, &id)?.ok_or_else(|| ServiceError::not_found("Text item"))?;
    Ok(Json(item).into_response())
}

/// PATCH /api/text/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<TextPatch>, JsonRejection>,
) -> AppResult<Response> {
    let patch = json_body(payload, "Invalid text update")?;
    let _writes = state.write_lock.lock().await;
    let item = text::update_text(&state.db, &id, patch)?;

    state
        .broadcaster
        .publish(ChangeEvent::text_updated(&item, item.display_order));
    Ok(item_response(&item))
}

/// PATCH /api/text/:id/rename
pub async fn rename(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<RenameBody>, JsonRejection>,
) -> AppResult<Response> {
    let body = json_body(payload, "Name is required")?;
    let _writes = state.write_lock.lock().await;
    let item = text::rename_text(&state.db, &id, &body.name)?;

    state
        .broadcaster
        .publish(ChangeEvent::text_updated(&item, item.display_order));
    Ok(item_response(&item))
}

/// PATCH /api/text/reorder
pub async fn reorder(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReorderBody>, JsonRejection>,
) -> AppResult<Response> {
    let body = json_body(payload, "sourceIndex and targetIndex are required")?;
    let (source, target) = body.indices()?;

    let _writes = state.write_lock.lock().await;
    let order = text::reorder_text(&state.db, source, target)?;

    state
        .broadcaster
        .publish(ChangeEvent::reordered(Collection::Text, order.clone()));
    Ok(Json(serde_json::json!({ "success": true, "order": order })).into_response())
}

/// DELETE /api/text/:id
pub async fn delete(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> AppResult<Response> {
    let _writes = state.write_lock.lock().await;
    text::delete_text(&state.db, &id)?;

    state.broadcaster.publish(ChangeEvent::deleted(Collection::Text, &id));
    Ok(Json(serde_json::json!({ "success": true })).into_response())
}
