use crate::api::error::AppError;
use crate::api::handlers::passthrough;
use crate::services::archive;
use crate::services::upstream::UploadFields;
use crate::utils::auth::CallerIdentity;
use axum::{
    Extension, Json,
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

const SUBMIT_ENDPOINT: &str = "v1/job/submit";
const QUERY_ENDPOINT: &str = "v1/job/query";

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

#[utoipa::path(
    post,
    path = "/jobs",
    responses(
        (status = 200, description = "Upstream job submission response, passed through"),
        (status = 400, description = "Missing filename or path"),
        (status = 401, description = "Missing caller identity"),
        (status = 500, description = "Packing or upstream failure")
    ),
    tag = "jobs"
)]
pub async fn submit_job(
    State(state): State<crate::AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(mut body): Json<Value>,
) -> Result<Response, AppError> {
    let fields = body
        .as_object_mut()
        .ok_or_else(|| AppError::BadRequest("request body must be a JSON object".to_string()))?;

    if !fields.contains_key("filename") || !fields.contains_key("path") {
        return Err(AppError::BadRequest(
            "missing filename or path".to_string(),
        ));
    }
    let filename = fields
        .get("filename")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("filename must be a string".to_string()))?
        .to_string();

    // The creator always comes from the authenticated caller, overwriting
    // anything the client sent.
    fields.insert("creator".to_string(), json!(caller.username));

    // Per-request staging name; concurrent submissions never clobber each
    // other's archive.
    let archive_path = state
        .config
        .staging_dir
        .join(format!("workspace-{}.tar.gz", Uuid::new_v4()));
    let source_dir = state.config.workspace_dir.clone();
    let archive_root = format!("{}-workspace", caller.username);

    let packed = {
        let archive_path = archive_path.clone();
        tokio::task::spawn_blocking(move || {
            archive::pack_workspace(&source_dir, &archive_root, &archive_path)
        })
        .await
        .map_err(|e| AppError::Internal(format!("archive task panicked: {}", e)))?
    };
    if let Err(e) = packed {
        let _ = tokio::fs::remove_file(&archive_path).await;
        return Err(e.into());
    }

    let upload = UploadFields {
        creator: caller.username.clone(),
        filename,
    };
    let result = state
        .upstream
        .post_file(SUBMIT_ENDPOINT, &upload, &archive_path)
        .await;

    if let Err(e) = tokio::fs::remove_file(&archive_path).await {
        tracing::warn!(
            "failed to remove staged archive {}: {}",
            archive_path.display(),
            e
        );
    }

    Ok(passthrough(result?))
}

#[utoipa::path(
    get,
    path = "/jobs",
    params(
        ("page" = Option<u32>, Query, description = "Page number, starting at 1"),
        ("page_size" = Option<u32>, Query, description = "Jobs per page")
    ),
    responses(
        (status = 200, description = "Upstream job list response, passed through"),
        (status = 400, description = "Invalid paging parameters"),
        (status = 401, description = "Missing caller identity")
    ),
    tag = "jobs"
)]
pub async fn list_jobs(
    State(state): State<crate::AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<JobListQuery>,
) -> Result<Response, AppError> {
    if query.page < 1 || query.page_size < 1 {
        return Err(AppError::BadRequest(
            "page and page_size must be positive".to_string(),
        ));
    }

    let body = json!({
        "page": query.page,
        "page_size": query.page_size,
        "creator": caller.username,
    });
    Ok(passthrough(
        state.upstream.post_json(QUERY_ENDPOINT, &body).await?,
    ))
}
