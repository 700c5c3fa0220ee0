use crate::services::RegistryError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

// Type alias for Result with our AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors returned by the HTTP handlers.
///
/// Every variant renders as `{"status": "error", "detail": "..."}`:
///
/// | Variant                          | Status |
/// |----------------------------------|--------|
/// | InvalidRequest, InvalidInput     | 400    |
/// | Conflict                         | 400    |
/// | NotFound                         | 404    |
/// | ScanFailed, StoreFailed, DeleteFailed | 500 |
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Registry(e) => match e {
                RegistryError::InvalidInput(_) | RegistryError::Conflict(_) => {
                    StatusCode::BAD_REQUEST
                }
                RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
                RegistryError::ScanFailed(_)
                | RegistryError::StoreFailed { .. }
                | RegistryError::DeleteFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = json!({
            "status": "error",
            "detail": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
