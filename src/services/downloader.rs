use crate::config::ProxyConfig;
use crate::services::upstream::{UpstreamApi, UpstreamError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

const ATTRS_ENDPOINT: &str = "v1/job/output/attrs";
const DOWNLOAD_ENDPOINT: &str = "v1/job/output/download";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("malformed upstream envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("invalid base64 chunk content: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("writing output file: {0}")]
    Io(#[from] std::io::Error),

    #[error("upstream reported unusable output filename {0:?}")]
    BadFilename(String),

    #[error("download stalled at offset {offset} of {size} bytes")]
    Stalled { offset: u64, size: u64 },
}

/// Output attributes envelope returned by `v1/job/output/attrs`.
#[derive(Debug, Deserialize)]
struct OutputAttrs {
    code: i64,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    size: u64,
}

/// Per-chunk envelope returned by `v1/job/output/download`.
#[derive(Debug, Deserialize)]
struct ChunkEnvelope {
    code: i64,
    #[serde(default)]
    content: String,
}

/// Result of an output retrieval.
#[derive(Debug)]
pub enum OutputOutcome {
    /// File reassembled byte-exact on local disk.
    Completed { filename: String },
    /// The upstream reported `code != 0`; its raw response body is relayed to
    /// the caller unchanged. When this happens mid-download, the partially
    /// written file stays on disk and its length must not be trusted.
    Rejected { body: String },
}

/// Fetch a job's output file in fixed-size chunks.
///
/// Drives attrs lookup, then a loop of offset-advancing download requests,
/// decoding the base64 payload of each chunk and appending it to the
/// destination file. The offset advances by the decoded byte length, not the
/// requested chunk size; the server may return short chunks, including a
/// final chunk smaller than the configured size.
pub async fn fetch_output(
    upstream: &dyn UpstreamApi,
    request: Map<String, Value>,
    config: &ProxyConfig,
) -> Result<OutputOutcome, DownloadError> {
    let mut request = Value::Object(request);

    let attrs_body = upstream.post_json(ATTRS_ENDPOINT, &request).await?;
    let attrs: OutputAttrs = serde_json::from_str(&attrs_body)?;
    if attrs.code != 0 {
        return Ok(OutputOutcome::Rejected { body: attrs_body });
    }

    // Only the file-name component is honored; the upstream does not get to
    // pick the destination directory.
    let local_name = Path::new(&attrs.filename)
        .file_name()
        .ok_or_else(|| DownloadError::BadFilename(attrs.filename.clone()))?
        .to_owned();
    let dest = config.workspace_dir.join(&local_name);
    let mut file = tokio::fs::File::create(&dest).await?;

    request["chunk"] = json!(config.chunk_size);
    let mut offset: u64 = 0;
    let mut stalled: u32 = 0;

    while offset < attrs.size {
        request["offset"] = json!(offset);
        let chunk_body = upstream.post_json(DOWNLOAD_ENDPOINT, &request).await?;
        let envelope: ChunkEnvelope = serde_json::from_str(&chunk_body)?;
        if envelope.code != 0 {
            tracing::warn!(
                "upstream aborted download of {:?} at offset {}",
                local_name,
                offset
            );
            file.flush().await?;
            return Ok(OutputOutcome::Rejected { body: chunk_body });
        }

        let bytes = BASE64.decode(envelope.content.as_bytes())?;
        if bytes.is_empty() {
            stalled += 1;
            if stalled >= config.max_stalled_chunks {
                return Err(DownloadError::Stalled {
                    offset,
                    size: attrs.size,
                });
            }
            continue;
        }
        stalled = 0;

        file.write_all(&bytes).await?;
        offset += bytes.len() as u64;
    }

    file.flush().await?;
    tracing::info!(
        "downloaded {:?} ({} bytes) to {}",
        local_name,
        attrs.size,
        config.workspace_dir.display()
    );
    Ok(OutputOutcome::Completed {
        filename: local_name.to_string_lossy().into_owned(),
    })
}
