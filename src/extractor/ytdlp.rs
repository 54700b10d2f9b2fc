use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use futures::stream::BoxStream;
use futures::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::models::{ExtractPlan, ExtractorConfig};
use super::MediaExtractor;
use crate::domain::MediaKind;

/// Expanded by yt-dlp with the source title and the negotiated extension.
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

const PROGRESS_PREFIX: &str = "PROGRESS|";
const PROGRESS_TEMPLATE: &str = "download:PROGRESS|%(progress._percent_str)s";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to run yt-dlp: {0}")]
    Io(#[from] std::io::Error),

    #[error("yt-dlp reported an error: {0}")]
    Tool(String),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

/// Drives the yt-dlp command-line tool. Network retrieval, format
/// negotiation, and audio transcoding all happen inside the tool; this type
/// only builds the invocation and relays its progress output.
#[derive(Debug, Clone)]
pub struct YtDlp {
    config: ExtractorConfig,
}

impl YtDlp {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }
}

impl MediaExtractor for YtDlp {
    fn extract(&self, plan: ExtractPlan) -> BoxStream<'static, Result<f32>> {
        spawn_tool_stream(self.config.binary.clone(), build_args(&plan, &self.config))
    }
}

/// Internal state for the extraction stream
enum ExtractState {
    Start {
        binary: PathBuf,
        args: Vec<OsString>,
    },
    Running {
        child: Child,
        lines: Lines<BufReader<ChildStdout>>,
        stderr_tail: JoinHandle<Option<String>>,
    },
    Finished,
}

/// Run the tool and surface its progress lines as a stream. stderr is drained
/// on its own task while stdout is read: a tool that floods stderr past the
/// pipe buffer would otherwise block mid-write and never close stdout.
fn spawn_tool_stream(binary: PathBuf, args: Vec<OsString>) -> BoxStream<'static, Result<f32>> {
    futures::stream::unfold(ExtractState::Start { binary, args }, |state| async move {
        match state {
            ExtractState::Start { binary, args } => {
                let mut child = match Command::new(&binary)
                    .args(&args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .kill_on_drop(true)
                    .spawn()
                {
                    Ok(child) => child,
                    Err(e) => return Some((Err(ExtractError::Io(e)), ExtractState::Finished)),
                };

                let Some(stdout) = child.stdout.take() else {
                    return Some((
                        Err(ExtractError::Tool(
                            "failed to capture yt-dlp stdout".to_string(),
                        )),
                        ExtractState::Finished,
                    ));
                };
                let Some(stderr) = child.stderr.take() else {
                    return Some((
                        Err(ExtractError::Tool(
                            "failed to capture yt-dlp stderr".to_string(),
                        )),
                        ExtractState::Finished,
                    ));
                };

                let stderr_tail = tokio::spawn(async move {
                    let mut lines = BufReader::new(stderr).lines();
                    let mut last_line = None;
                    while let Ok(Some(line)) = lines.next_line().await {
                        let trimmed = line.trim();
                        if !trimmed.is_empty() {
                            last_line = Some(trimmed.to_string());
                        }
                    }
                    last_line
                });

                tracing::debug!(binary = %binary.display(), "spawned extraction tool");

                Some((
                    Ok(0.0),
                    ExtractState::Running {
                        child,
                        lines: BufReader::new(stdout).lines(),
                        stderr_tail,
                    },
                ))
            }
            ExtractState::Running {
                mut child,
                mut lines,
                stderr_tail,
            } => {
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if let Some(ratio) = parse_progress_line(&line) {
                                return Some((
                                    Ok(ratio),
                                    ExtractState::Running {
                                        child,
                                        lines,
                                        stderr_tail,
                                    },
                                ));
                            }
                        }
                        Ok(None) => break,
                        Err(e) => return Some((Err(ExtractError::Io(e)), ExtractState::Finished)),
                    }
                }

                // stdout closed: collect the stderr tail, then judge the exit
                // status.
                let tool_output = stderr_tail.await.ok().flatten();

                match child.wait().await {
                    Ok(status) if status.success() => None,
                    Ok(status) => {
                        let message = tool_output
                            .unwrap_or_else(|| format!("yt-dlp exited with {status}"));
                        tracing::warn!(%message, "extraction tool failed");
                        Some((Err(ExtractError::Tool(message)), ExtractState::Finished))
                    }
                    Err(e) => Some((Err(ExtractError::Io(e)), ExtractState::Finished)),
                }
            }
            ExtractState::Finished => None,
        }
    })
    .boxed()
}

fn build_args(plan: &ExtractPlan, config: &ExtractorConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--no-playlist".into(),
        "--no-warnings".into(),
        "--newline".into(),
        "--progress".into(),
        "--progress-template".into(),
        PROGRESS_TEMPLATE.into(),
    ];

    match plan.kind {
        MediaKind::Video => {
            args.push("-f".into());
            args.push(
                config
                    .video_format
                    .clone()
                    .unwrap_or_else(|| "best".to_string())
                    .into(),
            );
        }
        MediaKind::Audio => {
            // Best available audio, transcoded to mp3 by the tool itself.
            args.push("-f".into());
            args.push("bestaudio/best".into());
            args.push("-x".into());
            args.push("--audio-format".into());
            args.push("mp3".into());
        }
    }

    if let Some(location) = &config.ffmpeg_location {
        args.push("--ffmpeg-location".into());
        args.push(location.clone().into_os_string());
    }

    args.push("-o".into());
    args.push(plan.dest_dir.join(OUTPUT_TEMPLATE).into_os_string());
    args.push(plan.url.clone().into());
    args
}

fn parse_progress_line(line: &str) -> Option<f32> {
    let raw = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let percent: f32 = raw.trim().trim_end_matches('%').trim().parse().ok()?;
    Some((percent / 100.0).clamp(0.0, 1.0))
}
