use crate::services::ServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

pub struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<ServiceError>() {
            Some(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(ServiceError::InvalidInput(_)) | Some(ServiceError::UnsupportedType) => {
                StatusCode::BAD_REQUEST
            }
            Some(ServiceError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("Application error: {:?}", self.0);
            "Internal server error".to_string()
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self.0);
            self.0.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
