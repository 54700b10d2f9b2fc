use std::collections::HashSet;
use std::path::PathBuf;

use futures::stream::BoxStream;
use futures::StreamExt;

use crate::domain::{DownloadRequest, FetchError, MaterializedFile, MediaKind, ProducedFile};
use crate::extractor::{ExtractPlan, MediaExtractor};
use crate::utils::{get_timestamp, is_valid_media_url, sanitize_filename};
use crate::workspace::Workspace;

#[derive(Debug, Clone)]
pub enum FetchEvent {
    Progress(f32),
    Completed(MaterializedFile),
    Failed(FetchError),
}

/// Turns one request into exactly one uniquely-named file in the workspace:
/// validate, prepare the directory, delegate to the extractor, discover the
/// produced file, rename it. One attempt per request, no retries.
#[derive(Clone)]
pub struct FetchWorkflow<E: MediaExtractor> {
    extractor: E,
    workspace: Workspace,
    /// When set, every regular file in the workspace is removed before the
    /// extractor runs, so the scan only ever sees the current request's
    /// output. The accumulate variant is kept for callers that want history.
    clear_before_fetch: bool,
}

impl<E: MediaExtractor> FetchWorkflow<E> {
    pub fn new(extractor: E, workspace: Workspace, clear_before_fetch: bool) -> Self {
        Self {
            extractor,
            workspace,
            clear_before_fetch,
        }
    }

    pub fn fetch_video(
        &self,
        url: String,
        custom_name: Option<String>,
    ) -> BoxStream<'static, FetchEvent> {
        self.fetch_stream(DownloadRequest::new(url, MediaKind::Video, custom_name))
    }

    pub fn fetch_audio(
        &self,
        url: String,
        custom_name: Option<String>,
    ) -> BoxStream<'static, FetchEvent> {
        self.fetch_stream(DownloadRequest::new(url, MediaKind::Audio, custom_name))
    }

    /// Event stream for one request: zero or more `Progress` items followed
    /// by exactly one `Completed` or `Failed`.
    pub fn fetch_stream(&self, request: DownloadRequest) -> BoxStream<'static, FetchEvent> {
        futures::stream::unfold(
            WorkflowState::Start {
                workflow: self.clone(),
                request,
            },
            |state| async move {
                match state {
                    WorkflowState::Start { workflow, request } => {
                        if !is_valid_media_url(&request.url) {
                            return Some((
                                FetchEvent::Failed(FetchError::InvalidRequest),
                                WorkflowState::Finished,
                            ));
                        }

                        let baseline = match workflow.prepare_workspace().await {
                            Ok(baseline) => baseline,
                            Err(e) => {
                                return Some((
                                    FetchEvent::Failed(FetchError::Io(e.to_string())),
                                    WorkflowState::Finished,
                                ))
                            }
                        };

                        tracing::info!(url = %request.url, kind = %request.kind, "starting fetch");

                        let plan = ExtractPlan {
                            url: request.url.clone(),
                            kind: request.kind,
                            dest_dir: workflow.workspace.root().to_path_buf(),
                        };
                        let stream = workflow.extractor.extract(plan);

                        Some((
                            FetchEvent::Progress(0.0),
                            WorkflowState::Extracting {
                                workflow,
                                request,
                                baseline,
                                stream,
                            },
                        ))
                    }
                    WorkflowState::Extracting {
                        workflow,
                        request,
                        baseline,
                        mut stream,
                    } => match stream.next().await {
                        Some(Ok(ratio)) => Some((
                            FetchEvent::Progress(ratio),
                            WorkflowState::Extracting {
                                workflow,
                                request,
                                baseline,
                                stream,
                            },
                        )),
                        Some(Err(e)) => Some((
                            FetchEvent::Failed(FetchError::FetchFailed(e.to_string())),
                            WorkflowState::Finished,
                        )),
                        None => {
                            let event = match workflow.finalize(&request, &baseline).await {
                                Ok(file) => FetchEvent::Completed(file),
                                Err(e) => FetchEvent::Failed(e),
                            };
                            Some((event, WorkflowState::Finished))
                        }
                    },
                    WorkflowState::Finished => None,
                }
            },
        )
        .boxed()
    }

    /// Drive a request to completion and return the final artifact. The
    /// streaming variant above feeds the UI; this one serves tests and any
    /// caller that has no use for progress.
    pub async fn fetch(&self, request: DownloadRequest) -> Result<MaterializedFile, FetchError> {
        let mut stream = self.fetch_stream(request);
        while let Some(event) = stream.next().await {
            match event {
                FetchEvent::Progress(_) => {}
                FetchEvent::Completed(file) => return Ok(file),
                FetchEvent::Failed(e) => return Err(e),
            }
        }
        Err(FetchError::FetchFailed(
            "extraction ended without a result".to_string(),
        ))
    }

    /// Prepare the directory and return the files already in it, so the later
    /// scan only considers what this request's extraction produced.
    async fn prepare_workspace(&self) -> std::io::Result<HashSet<PathBuf>> {
        self.workspace.ensure_exists().await?;
        if self.clear_before_fetch {
            self.workspace.clear().await?;
        }
        self.workspace.snapshot().await
    }

    /// Scan for the extractor's output and rename it to its unique final
    /// name. The extractor succeeding but producing nothing on the kind's
    /// allow-list is `NotFound`, distinct from a tool failure.
    async fn finalize(
        &self,
        request: &DownloadRequest,
        baseline: &HashSet<PathBuf>,
    ) -> Result<MaterializedFile, FetchError> {
        let produced = self
            .workspace
            .find_produced(request.kind, baseline)
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?
            .ok_or(FetchError::NotFound(request.kind))?;

        self.materialize(produced, request.custom_name.as_deref())
            .await
    }

    async fn materialize(
        &self,
        produced: ProducedFile,
        custom_name: Option<&str>,
    ) -> Result<MaterializedFile, FetchError> {
        let base = match custom_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => sanitize_filename(name),
            None => sanitize_filename(&produced.title),
        };

        let target = self
            .unique_target(&base, &produced.extension, get_timestamp())
            .await?;

        tokio::fs::rename(&produced.path, &target)
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;

        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(file = %file_name, "materialized download");

        Ok(MaterializedFile {
            file_name,
            path: target,
        })
    }

    /// First free `{base}_{stamp}.{extension}` path, bumping the stamp when a
    /// previous artifact already took the name, so two requests landing in
    /// the same second never overwrite each other.
    async fn unique_target(
        &self,
        base: &str,
        extension: &str,
        mut stamp: u64,
    ) -> Result<PathBuf, FetchError> {
        loop {
            let candidate = self
                .workspace
                .root()
                .join(format!("{base}_{stamp}.{extension}"));
            let exists = tokio::fs::try_exists(&candidate)
                .await
                .map_err(|e| FetchError::Io(e.to_string()))?;
            if !exists {
                return Ok(candidate);
            }
            stamp += 1;
        }
    }
}

/// Internal state for the fetch stream
enum WorkflowState<E: MediaExtractor> {
    Start {
        workflow: FetchWorkflow<E>,
        request: DownloadRequest,
    },
    Extracting {
        workflow: FetchWorkflow<E>,
        request: DownloadRequest,
        baseline: HashSet<PathBuf>,
        stream: BoxStream<'static, crate::extractor::Result<f32>>,
    },
    Finished,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::extractor::ExtractError;

    /// Stands in for yt-dlp: records that it ran, then either fails or drops
    /// the configured files into the destination directory.
    #[derive(Clone, Default)]
    struct FakeExtractor {
        produces: Vec<&'static str>,
        fails_with: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl MediaExtractor for FakeExtractor {
        fn extract(&self, plan: ExtractPlan) -> BoxStream<'static, crate::extractor::Result<f32>> {
            let fake = self.clone();
            futures::stream::once(async move {
                fake.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(message) = fake.fails_with {
                    return Err(ExtractError::Tool(message.to_string()));
                }
                for name in &fake.produces {
                    tokio::fs::write(plan.dest_dir.join(name), b"media bytes")
                        .await
                        .expect("fake extractor write");
                }
                Ok(1.0)
            })
            .boxed()
        }
    }

    fn workflow_with(
        dir: &tempfile::TempDir,
        extractor: FakeExtractor,
        clear_before_fetch: bool,
    ) -> FetchWorkflow<FakeExtractor> {
        FetchWorkflow::new(extractor, Workspace::new(dir.path()), clear_before_fetch)
    }

    fn video_request(custom_name: Option<&str>) -> DownloadRequest {
        DownloadRequest::new(
            "https://example.com/watch?v=abc",
            MediaKind::Video,
            custom_name.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn successful_video_fetch_materializes_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor {
            produces: vec!["My Title.mp4", "My Title.description"],
            ..Default::default()
        };
        let workflow = workflow_with(&dir, extractor, true);

        let file = workflow.fetch(video_request(None)).await.unwrap();

        assert!(file.path.is_file());
        assert!(file.path.starts_with(dir.path()));
        assert!(file.file_name.starts_with("My Title_"));
        assert!(file.file_name.ends_with(".mp4"));
        // The sidecar file is not a video and must be left alone.
        assert!(dir.path().join("My Title.description").is_file());
    }

    #[tokio::test]
    async fn clearing_policy_purges_stale_files_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stale.mp4"), b"old").unwrap();
        let extractor = FakeExtractor {
            produces: vec!["Fresh.mp4"],
            ..Default::default()
        };
        let workflow = workflow_with(&dir, extractor, true);

        let file = workflow.fetch(video_request(None)).await.unwrap();

        assert!(!dir.path().join("stale.mp4").exists());
        assert!(file.file_name.starts_with("Fresh_"));
    }

    #[tokio::test]
    async fn audio_with_no_matching_extension_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor {
            produces: vec!["clip.mp4"],
            ..Default::default()
        };
        let workflow = workflow_with(&dir, extractor, true);

        let request = DownloadRequest::new(
            "https://example.com/watch?v=abc",
            MediaKind::Audio,
            None,
        );
        let err = workflow.fetch(request).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(MediaKind::Audio)));
        // The workflow itself leaves whatever the extractor wrote in place.
        assert!(dir.path().join("clip.mp4").is_file());
    }

    #[tokio::test]
    async fn tool_failure_is_reported_as_fetch_failed() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor {
            fails_with: Some("Unsupported URL"),
            ..Default::default()
        };
        let workflow = workflow_with(&dir, extractor, true);

        let err = workflow.fetch(video_request(None)).await.unwrap_err();
        match err {
            FetchError::FetchFailed(message) => assert!(message.contains("Unsupported URL")),
            other => panic!("expected FetchFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_url_never_reaches_the_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor::default();
        let calls = Arc::clone(&extractor.calls);
        let workflow = workflow_with(&dir, extractor, true);

        for url in ["", "   ", "not a url"] {
            let request = DownloadRequest::new(url, MediaKind::Video, None);
            let err = workflow.fetch(request).await.unwrap_err();
            assert!(matches!(err, FetchError::InvalidRequest));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn custom_name_replaces_the_title() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor {
            produces: vec!["Whatever The Site Says.mp4"],
            ..Default::default()
        };
        let workflow = workflow_with(&dir, extractor, true);

        let file = workflow
            .fetch(video_request(Some("my/pick")))
            .await
            .unwrap();
        // Sanitized: path separators become underscores.
        assert!(file.file_name.starts_with("my_pick_"));
        assert!(file.file_name.ends_with(".mp4"));
    }

    #[tokio::test]
    async fn earlier_artifacts_are_not_mistaken_for_new_output() {
        let dir = tempfile::tempdir().unwrap();
        let producing = FakeExtractor {
            produces: vec!["Keeper.mp4"],
            ..Default::default()
        };
        // Accumulate variant: the first artifact stays in the workspace.
        let workflow = workflow_with(&dir, producing, false);
        let first = workflow.fetch(video_request(None)).await.unwrap();

        // Second run succeeds but writes nothing; the surviving artifact must
        // not be re-selected and renamed into a false success.
        let empty_handed = FakeExtractor::default();
        let workflow = workflow_with(&dir, empty_handed, false);
        let err = workflow.fetch(video_request(None)).await.unwrap_err();

        assert!(matches!(err, FetchError::NotFound(MediaKind::Video)));
        assert!(first.path.is_file());
    }

    #[tokio::test]
    async fn repeated_fetches_never_overwrite_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor {
            produces: vec!["Same Title.mp4"],
            ..Default::default()
        };
        // Accumulate variant, so the first artifact survives the second run.
        let workflow = workflow_with(&dir, extractor, false);

        let first = workflow.fetch(video_request(None)).await.unwrap();
        let second = workflow.fetch(video_request(None)).await.unwrap();

        assert_ne!(first.path, second.path);
        assert!(first.path.is_file());
        assert!(second.path.is_file());
    }

    #[tokio::test]
    async fn timestamp_collisions_bump_to_the_next_free_name() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = workflow_with(&dir, FakeExtractor::default(), false);
        tokio::fs::write(dir.path().join("Song_1700000000.mp3"), b"x")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("Song_1700000001.mp3"), b"x")
            .await
            .unwrap();

        let target = workflow
            .unique_target("Song", "mp3", 1_700_000_000)
            .await
            .unwrap();

        assert_eq!(
            target.file_name().unwrap().to_string_lossy(),
            "Song_1700000002.mp3"
        );
    }

    #[tokio::test]
    async fn stream_emits_progress_then_a_terminal_event() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor {
            produces: vec!["Stream Me.webm"],
            ..Default::default()
        };
        let workflow = workflow_with(&dir, extractor, true);

        let events: Vec<FetchEvent> = workflow
            .fetch_stream(video_request(None))
            .collect()
            .await;

        assert!(matches!(events.first(), Some(FetchEvent::Progress(_))));
        match events.last() {
            Some(FetchEvent::Completed(file)) => {
                assert!(file.file_name.ends_with(".webm"));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }
}
