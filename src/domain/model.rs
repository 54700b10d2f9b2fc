use std::fmt;
use std::path::PathBuf;

/// Which kind of media the user asked for. Decides the format selector sent
/// to the extractor and which file extensions count as its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Extensions the extractor may legitimately produce for this kind.
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            MediaKind::Video => &["mp4", "mkv", "webm"],
            MediaKind::Audio => &["mp3", "webm"],
        }
    }

    pub fn matches_extension(self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.allowed_extensions().contains(&extension.as_str())
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// One user action. Immutable; dropped once the workflow finishes.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub kind: MediaKind,
    pub custom_name: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, kind: MediaKind, custom_name: Option<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            custom_name,
        }
    }
}

/// A file the extractor wrote into the workspace. Discovered by scanning,
/// never constructed from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedFile {
    pub title: String,
    pub extension: String,
    pub path: PathBuf,
}

/// The renamed final artifact, `{base}_{unix_timestamp}.{extension}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedFile {
    pub file_name: String,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_lists_per_kind() {
        assert!(MediaKind::Video.matches_extension("mp4"));
        assert!(MediaKind::Video.matches_extension("MKV"));
        assert!(!MediaKind::Video.matches_extension("mp3"));
        assert!(MediaKind::Audio.matches_extension("mp3"));
        assert!(MediaKind::Audio.matches_extension("webm"));
        assert!(!MediaKind::Audio.matches_extension("mp4"));
    }
}
