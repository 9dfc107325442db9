use crate::models::{ChangeEvent, Collection, MediaItem, NewUpload};
#[cfg(feature = "remote-upload")]
use crate::services::remote;
use crate::services::{media, ServiceError};
use crate::web::error::AppResult;
use crate::web::extractors::{json_body, MediaKind};
use crate::web::state::AppState;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderBody {
    pub source_index: i64,
    pub target_index: i64,
}

impl ReorderBody {
    pub fn indices(&self) -> Result<(usize, usize), ServiceError> {
        let source = usize::try_from(self.source_index).map_err(|_| ServiceError::invalid("Invalid index"))?;
        let target = usize::try_from(self.target_index).map_err(|_| ServiceError::invalid("Invalid index"))?;
        Ok((source, target))
    }
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
    pub name: String,
}

fn item_response(item: &MediaItem) -> Response {
    Json(serde_json::json!({ "success": true, "item": item })).into_response()
}

/// GET /api/media
pub async fn list_library(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    let library = media::list_library(&state.db)?;
    Ok(Json(library).into_response())
}

/// GET /api/media/:type
pub async fn list_collection(
    State(state): State<Arc<AppState>>,
    MediaKind(media_type): MediaKind,
) -> AppResult<Response> {
    let items = media::list_media(&state.db, media_type)?;
    Ok(Json(items).into_response())
}

/// POST /api/upload
pub async fn upload(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> AppResult<Response> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut custom_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, state.max_upload_bytes))?
    {
        match field.name() {
            Some("file") => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, state.max_upload_bytes))?;
                file = Some((original_name, content_type, data.to_vec()));
            }
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, state.max_upload_bytes))?;
                custom_name = Some(text);
            }
            _ => {}
        }
    }

    let Some((original_name, mime_type, data)) = file else {
        return Err(ServiceError::invalid("No file uploaded").into());
    };

    let _writes = state.write_lock.lock().await;
    let item = media::upload_media(
        &state.db,
        &state.store,
        state.max_upload_bytes,
        NewUpload {
            original_name,
            custom_name,
            mime_type,
            data,
            source_url: None,
        },
    )?;

    state.broadcaster.publish(ChangeEvent::media_inserted(&item));
    Ok(item_response(&item))
}

fn multipart_error(err: MultipartError, max: usize) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::TooLarge { max }
    } else {
        ServiceError::invalid(err.body_text())
    }
}

#[cfg(feature = "remote-upload")]
#[derive(Debug, Deserialize)]
pub struct UrlUploadBody {
    pub url: Option<String>,
    pub name: Option<String>,
}

/// POST /api/upload-url
#[cfg(feature = "remote-upload")]
pub async fn upload_url(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UrlUploadBody>, JsonRejection>,
) -> AppResult<Response> {
    let body = json_body(payload, "URL is required")?;
    let url = body
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ServiceError::invalid("URL is required"))?;

    let fetched = remote::fetch_remote(&state.http, &url, state.max_upload_bytes).await?;

    let _writes = state.write_lock.lock().await;
    let item = remote::store_fetched(
        &state.db,
        &state.store,
        fetched,
        &url,
        body.name,
        state.max_upload_bytes,
    )?;

    state.broadcaster.publish(ChangeEvent::media_inserted(&item));
    Ok(item_response(&item))
}

/// PATCH /api/media/:type/reorder
pub async fn reorder(
    State(state): State<Arc<AppState>>,
    MediaKind(media_type): MediaKind,
    payload: Result<Json<ReorderBody>, JsonRejection>,
) -> AppResult<Response> {
    let body = json_body(payload, "sourceIndex and targetIndex are required")?;
    let (source, target) = body.indices()?;

    let _writes = state.write_lock.lock().await;
    let order = media::reorder_media(&state.db, media_type, source, target)?;

    state
        .broadcaster
        .publish(ChangeEvent::reordered(Collection::Media(media_type), order.clone()));
    Ok(Json(serde_json::json!({ "success": true, "order": order })).into_response())
}

/// PATCH /api/media/:type/:id/rename
pub async fn rename(
    State(state): State<Arc<AppState>>,
    MediaKind(media_type): MediaKind,
    Path((_, id)): Path<(String, String)>,
    payload: Result<Json<RenameBody>, JsonRejection>,
) -> AppResult<Response> {
    let body = json_body(payload, "Name is required")?;
    let _writes = state.write_lock.lock().await;
    let item = media::rename_media(&state.db, media_type, &id, &body.name)?;

    state
        .broadcaster
        .publish(ChangeEvent::media_updated(&item, item.display_order));
    Ok(item_response(&item))
}

/// DELETE /api/media/:type/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    MediaKind(media_type): MediaKind,
    Path((_, id)): Path<(String, String)>,
) -> AppResult<Response> {
    let _writes = state.write_lock.lock().await;
    media::delete_media(&state.db, &state.store, media_type, &id)?;

    state
        .broadcaster
        .publish(ChangeEvent::deleted(Collection::Media(media_type), &id));
    Ok(Json(serde_json::json!({ "success": true })).into_response())
}
