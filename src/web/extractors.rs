use crate::models::MediaType;
use crate::services::ServiceError;
use crate::web::error::json_error;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// The `:type` path segment, resolved to a media collection.
pub struct MediaKind(pub MediaType);

impl<S> FromRequestParts<S> for MediaKind
where
    S: Send + Sync,
{
    type Rejection = Response;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 S,
    ) -> Pin<Box<dyn Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
                .await
                .map_err(IntoResponse::into_response)?;

            params
                .get("type")
                .and_then(|raw| raw.parse::<MediaType>().ok())
                .map(MediaKind)
                .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "Invalid media type"))
        })
    }
}

/// Unwraps a JSON body, reporting malformed input as a 400 with `message`.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>, message: &str) -> Result<T, ServiceError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::debug!("Rejected JSON body: {}", rejection.body_text());
            Err(ServiceError::invalid(message))
        }
    }
}
