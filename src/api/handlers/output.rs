use crate::api::error::AppError;
use crate::api::handlers::passthrough;
use crate::services::downloader::{self, OutputOutcome};
use crate::utils::auth::CallerIdentity;
use axum::{Extension, Json, extract::State, response::Response};
use serde_json::{Value, json};

#[utoipa::path(
    post,
    path = "/output",
    responses(
        (status = 200, description = "Success envelope, or the upstream error envelope verbatim"),
        (status = 401, description = "Missing caller identity"),
        (status = 500, description = "Transport or download failure")
    ),
    tag = "jobs"
)]
pub async fn retrieve_output(
    State(state): State<crate::AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let mut request = body
        .as_object()
        .cloned()
        .ok_or_else(|| AppError::BadRequest("request body must be a JSON object".to_string()))?;
    request.insert("creator".to_string(), json!(caller.username));

    let outcome =
        downloader::fetch_output(state.upstream.as_ref(), request, &state.config).await?;
    match outcome {
        OutputOutcome::Completed { filename } => Ok(passthrough(
            json!({ "code": 0, "msg": "Success", "filename": filename }).to_string(),
        )),
        OutputOutcome::Rejected { body } => Ok(passthrough(body)),
    }
}
