use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::extractor::ExtractorConfig;

/// Application configuration, read from an optional `downloader.json` next to
/// the working directory. A missing file means defaults; a malformed one is
/// logged and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Workspace directory for staged and renamed files.
    pub save_dir: PathBuf,
    /// Purge the workspace before every fetch so the scan only sees the
    /// current request's output.
    pub clear_before_fetch: bool,
    pub extractor: ExtractorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("./downloads"),
            clear_before_fetch: true,
            extractor: ExtractorConfig::default(),
        }
    }
}

impl AppConfig {
    pub const FILE_NAME: &'static str = "downloader.json";

    pub fn load_or_default() -> Self {
        match std::fs::read_to_string(Self::FILE_NAME) {
            Ok(raw) => Self::from_json(&raw),
            Err(_) => Self::default(),
        }
    }

    fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!(file = Self::FILE_NAME, error = %e, "ignoring malformed config");
            Self::default()
        })
    }
}
