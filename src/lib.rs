pub mod api;
pub mod config;
pub mod services;
pub mod utils;

use crate::config::ProxyConfig;
use crate::services::upstream::UpstreamApi;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::jobs::submit_job,
        api::handlers::jobs::list_jobs,
        api::handlers::output::retrieve_output,
        api::handlers::attestation::get_attestation,
    ),
    tags(
        (name = "jobs", description = "Data Clean Room job proxy endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn UpstreamApi>,
    pub config: ProxyConfig,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/jobs",
            post(api::handlers::jobs::submit_job).get(api::handlers::jobs::list_jobs),
        )
        .route("/output", post(api::handlers::output::retrieve_output))
        .route(
            "/attestation",
            get(api::handlers::attestation::get_attestation),
        )
        .layer(from_fn(api::middleware::auth::auth_middleware))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
