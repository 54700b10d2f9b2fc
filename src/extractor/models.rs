use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::MediaKind;

/// What the workflow asks the extractor to do for one request.
#[derive(Debug, Clone)]
pub struct ExtractPlan {
    pub url: String,
    pub kind: MediaKind,
    /// Directory the tool writes into; the workflow discovers the result here.
    pub dest_dir: PathBuf,
}

/// Configuration for the extraction tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// The yt-dlp binary to invoke.
    pub binary: PathBuf,
    /// Passed to `--ffmpeg-location` when set; `None` leaves the lookup to
    /// yt-dlp itself.
    pub ffmpeg_location: Option<PathBuf>,
    /// Explicit video format selector; `None` falls back to "best".
    pub video_format: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: which::which("yt-dlp").unwrap_or_else(|_| PathBuf::from("yt-dlp")),
            ffmpeg_location: which::which("ffmpeg").ok(),
            video_format: None,
        }
    }
}
