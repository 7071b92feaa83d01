pub mod attestation;
pub mod jobs;
pub mod output;

use axum::http::header;
use axum::response::{IntoResponse, Response};

/// Relay an upstream response body to the caller unchanged. The Data Clean
/// Room API speaks JSON.
pub(crate) fn passthrough(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}
