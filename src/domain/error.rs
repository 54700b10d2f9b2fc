use thiserror::Error;

use super::model::MediaKind;

/// Everything a fetch can fail with. Each failure is reported to the caller
/// and leaves the app ready for the next attempt; nothing is retried.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Invalid or empty media URL")]
    InvalidRequest,

    #[error("Extraction failed: {0}")]
    FetchFailed(String),

    #[error("Extractor produced no file with a known {0} extension")]
    NotFound(MediaKind),

    #[error("I/O error: {0}")]
    Io(String),
}
