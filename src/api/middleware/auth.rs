use crate::api::error::AppError;
use crate::utils::auth::CallerIdentity;
use axum::{extract::Request, middleware::Next, response::Response};

/// Header carrying the authenticated username, set by the notebook server
/// fronting this proxy.
pub const FORWARDED_USER_HEADER: &str = "x-forwarded-user";

/// Rejects requests without a forwarded caller identity and makes the
/// identity available to handlers via request extensions.
pub async fn auth_middleware(mut req: Request, next: Next) -> Result<Response, AppError> {
    let username = req
        .headers()
        .get(FORWARDED_USER_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string);

    if let Some(username) = username {
        req.extensions_mut().insert(CallerIdentity { username });
        return Ok(next.run(req).await);
    }

    Err(AppError::Unauthorized(
        "missing caller identity".to_string(),
    ))
}
