use crate::config::ProxyConfig;
use crate::utils::url::join_url;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Fixed filename the archive is uploaded under, regardless of its staging
/// name on disk.
pub const UPLOAD_FILENAME: &str = "workspace.tar.gz";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(StatusCode),

    #[error("redirect response missing Location header")]
    MissingRedirectLocation,

    #[error("reading staged archive: {0}")]
    Io(#[from] std::io::Error),
}

/// Multipart fields accompanying a workspace upload.
#[derive(Debug, Clone)]
pub struct UploadFields {
    pub creator: String,
    pub filename: String,
}

/// Seam between the proxy and the Data Clean Room API. Implemented over HTTP
/// in production and mocked in tests.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// POST a JSON body to `endpoint` and return the 200 response text.
    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<String, UpstreamError>;

    /// POST the staged workspace archive to `endpoint` as a multipart form,
    /// replaying once on a 307 redirect.
    async fn post_file(
        &self,
        endpoint: &str,
        fields: &UploadFields,
        archive: &Path,
    ) -> Result<String, UpstreamError>;
}

pub struct HttpUpstreamClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpUpstreamClient {
    pub fn new(config: &ProxyConfig) -> Result<Self, UpstreamError> {
        // Redirects are handled explicitly in post_file; auto-following would
        // try to replay a consumed multipart body.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            http,
            base_url: config.backend_base_url(),
            token: config.auth_token().to_string(),
        })
    }

    /// Multipart bodies are not replayable across requests, so each attempt
    /// rebuilds the form from the archive on disk.
    async fn build_form(
        &self,
        fields: &UploadFields,
        archive: &Path,
    ) -> Result<Form, UpstreamError> {
        let contents = tokio::fs::read(archive).await?;
        let part = Part::bytes(contents)
            .file_name(UPLOAD_FILENAME)
            .mime_str("application/gzip")?;
        Ok(Form::new()
            .part("file", part)
            .text("creator", fields.creator.clone())
            .text("filename", fields.filename.clone()))
    }
}

#[async_trait]
impl UpstreamApi for HttpUpstreamClient {
    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<String, UpstreamError> {
        let url = join_url(&self.base_url, endpoint);
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.token.as_str())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::error!("Data Clean Room API returned {} for {}", status, endpoint);
            return Err(UpstreamError::Status(status));
        }
        Ok(response.text().await?)
    }

    async fn post_file(
        &self,
        endpoint: &str,
        fields: &UploadFields,
        archive: &Path,
    ) -> Result<String, UpstreamError> {
        let url = join_url(&self.base_url, endpoint);
        let form = self.build_form(fields, archive).await?;
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.token.as_str())
            .multipart(form)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.text().await?),
            StatusCode::TEMPORARY_REDIRECT => {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_owned)
                    .ok_or(UpstreamError::MissingRedirectLocation)?;
                let redirect_url = join_url(&self.base_url, &location);
                tracing::debug!("replaying upload after 307 redirect to {}", redirect_url);

                let form = self.build_form(fields, archive).await?;
                let redirected = self
                    .http
                    .post(&redirect_url)
                    .header(AUTHORIZATION, self.token.as_str())
                    .multipart(form)
                    .send()
                    .await?;

                let status = redirected.status();
                if status != StatusCode::OK {
                    tracing::error!("redirected upload returned {} from {}", status, redirect_url);
                    return Err(UpstreamError::Status(status));
                }
                Ok(redirected.text().await?)
            }
            status => {
                tracing::error!("Data Clean Room API returned {} for {}", status, endpoint);
                Err(UpstreamError::Status(status))
            }
        }
    }
}
