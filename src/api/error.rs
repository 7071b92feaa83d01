use crate::services::archive::PackError;
use crate::services::downloader::DownloadError;
use crate::services::upstream::UpstreamError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Archive error: {0}")]
    Pack(#[from] PackError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(e) => {
                tracing::error!("Upstream call failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error from Data Clean Room API".to_string(),
                )
            }
            AppError::Download(e) => {
                tracing::error!("Output download failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error from Data Clean Room API".to_string(),
                )
            }
            AppError::Pack(e) => {
                tracing::error!("Workspace packing failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
