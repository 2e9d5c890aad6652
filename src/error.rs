// Error types for the track fetcher. The rest of the crate uses `anyhow`,
// but a download has a handful of outcomes the command loop reports
// differently (a 403 gets an extra hint), so those are spelled out here.

use thiserror::Error;

/// Hint printed under a 403 response.
pub const FORBIDDEN_HINT: &str = "Access forbidden - check your Bearer Token and User ID";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No URL provided")]
    EmptyUrl,

    #[error("No bearer token configured. Run setup first.")]
    MissingCredentials,

    #[error("Bearer token contains characters that cannot be sent in a header")]
    InvalidToken,

    #[error("Cannot derive a file name from {0}")]
    NoFileName(String),

    #[error("HTTP 403: {}", FORBIDDEN_HINT)]
    Forbidden,

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Download interrupted")]
    Interrupted,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// True when the server rejected the credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, FetchError::Forbidden)
    }
}
