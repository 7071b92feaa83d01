use std::env;
use std::path::PathBuf;

/// Download chunk size requested from the Data Clean Room API (default: 3 MB)
pub const DEFAULT_CHUNK_SIZE: usize = 3 * 1024 * 1024;

/// Consecutive empty chunk responses tolerated before a download is declared
/// stalled (default: 3)
pub const DEFAULT_MAX_STALLED_CHUNKS: u32 = 3;

/// Proxy configuration, loaded once at startup and passed explicitly to every
/// component.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Data Clean Room API host; scheme is optional and defaults to `http://`
    pub backend_host: String,

    /// User token forwarded verbatim as the `Authorization` header
    pub user_token: String,

    /// Directory packed into the workspace archive on job submission and the
    /// destination for downloaded output files
    pub workspace_dir: PathBuf,

    /// Directory holding per-request staged workspace archives
    pub staging_dir: PathBuf,

    /// Chunk size embedded in every output download request
    pub chunk_size: usize,

    /// No-progress bound for the chunked download loop
    pub max_stalled_chunks: u32,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            backend_host: String::new(),
            user_token: String::new(),
            workspace_dir: PathBuf::from("."),
            staging_dir: env::temp_dir(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_stalled_chunks: DEFAULT_MAX_STALLED_CHUNKS,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            backend_host: env::var("DATA_CLEAN_ROOM_HOST").unwrap_or_default(),

            user_token: env::var("USER_TOKEN").unwrap_or_default(),

            workspace_dir: env::var("WORKSPACE_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.workspace_dir),

            staging_dir: env::var("ARCHIVE_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            chunk_size: env::var("DOWNLOAD_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.chunk_size),

            max_stalled_chunks: env::var("MAX_STALLED_CHUNKS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_stalled_chunks),
        }
    }

    /// Base URL of the Data Clean Room API, with `http://` prepended when the
    /// configured host carries no scheme.
    pub fn backend_base_url(&self) -> String {
        if self.backend_host.starts_with("http://") || self.backend_host.starts_with("https://") {
            self.backend_host.clone()
        } else {
            format!("http://{}", self.backend_host)
        }
    }

    pub fn auth_token(&self) -> &str {
        &self.user_token
    }
}
