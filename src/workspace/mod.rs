use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::domain::{MediaKind, ProducedFile};

/// The single staging directory for extractor output. The root is injected at
/// construction so tests can point separate instances at temporary
/// directories.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root (and parents) if absent. Idempotent.
    pub async fn ensure_exists(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Delete every regular file directly inside the root. Subdirectories and
    /// their contents are left untouched. An already-empty root is not an
    /// error; a locked or unreadable file is, and aborts the request.
    pub async fn clear(&self) -> io::Result<()> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }

    /// Regular files directly inside the root, sorted lexicographically by
    /// file name so listings are deterministic.
    pub async fn list_regular_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// The set of regular files currently inside the root, taken before the
    /// extractor runs so its output can be told apart from older artifacts.
    pub async fn snapshot(&self) -> io::Result<HashSet<PathBuf>> {
        Ok(self.list_regular_files().await?.into_iter().collect())
    }

    /// Find the extractor's output for the requested kind: regular files whose
    /// extension is on the kind's allow-list, newest modification time first,
    /// ties broken by lexicographically greatest file name. Paths already
    /// present in `baseline` are skipped, so artifacts accumulated by earlier
    /// requests are never mistaken for fresh output.
    pub async fn find_produced(
        &self,
        kind: MediaKind,
        baseline: &HashSet<PathBuf>,
    ) -> io::Result<Option<ProducedFile>> {
        let mut candidates = Vec::new();
        for path in self.list_regular_files().await? {
            if baseline.contains(&path) {
                continue;
            }
            let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !kind.matches_extension(extension) {
                continue;
            }
            let modified = tokio::fs::metadata(&path).await?.modified()?;
            candidates.push((path, modified));
        }

        Ok(pick_latest(candidates).map(|path| {
            let title = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("download")
                .to_string();
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_ascii_lowercase();
            ProducedFile {
                title,
                extension,
                path,
            }
        }))
    }
}

/// Tie-break rule for multiple matching files: newest modification time wins,
/// equal times fall back to the lexicographically greatest name.
fn pick_latest(mut candidates: Vec<(PathBuf, SystemTime)>) -> Option<PathBuf> {
    candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    candidates.pop().map(|(path, _)| path)
}
