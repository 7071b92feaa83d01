use crate::api::error::AppError;
use crate::api::handlers::passthrough;
use crate::utils::auth::CallerIdentity;
use axum::{
    Extension,
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use serde_json::json;

const ATTESTATION_ENDPOINT: &str = "v1/job/attestation/";

#[derive(Debug, Deserialize)]
pub struct AttestationQuery {
    #[serde(default = "default_id")]
    pub id: u32,
}

fn default_id() -> u32 {
    1
}

#[utoipa::path(
    get,
    path = "/attestation",
    params(
        ("id" = Option<u32>, Query, description = "Attestation report id, starting at 1")
    ),
    responses(
        (status = 200, description = "Upstream attestation response, passed through"),
        (status = 400, description = "Invalid id"),
        (status = 401, description = "Missing caller identity")
    ),
    tag = "jobs"
)]
pub async fn get_attestation(
    State(state): State<crate::AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<AttestationQuery>,
) -> Result<Response, AppError> {
    if query.id < 1 {
        return Err(AppError::BadRequest("id must be positive".to_string()));
    }

    let body = json!({ "id": query.id, "creator": caller.username });
    Ok(passthrough(
        state.upstream.post_json(ATTESTATION_ENDPOINT, &body).await?,
    ))
}
