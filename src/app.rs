use std::path::PathBuf;

use futures::StreamExt;
use iced::Task;

use crate::application::{FetchEvent, FetchWorkflow};
use crate::config::AppConfig;
use crate::domain::MediaKind;
use crate::extractor::YtDlp;
use crate::ui::{FetchMessage, FetchView};
use crate::workspace::Workspace;

pub struct DownloadApp {
    view: FetchView,
    workflow: FetchWorkflow<YtDlp>,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadApp {
    pub fn new() -> Self {
        let config = AppConfig::load_or_default();
        let extractor = YtDlp::new(config.extractor);
        let workspace = Workspace::new(config.save_dir);
        let workflow = FetchWorkflow::new(extractor, workspace, config.clear_before_fetch);

        Self {
            view: FetchView::default(),
            workflow,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(FetchMessage),
    /// An event from the running fetch stream
    FetchEvent(FetchEvent),
    /// (Selected copy target, source file)
    CopyTargetSelected(Option<PathBuf>, PathBuf),
    /// Final result of copying the artifact out of the workspace
    CopyFinished(Result<PathBuf, String>),
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                FetchMessage::PullVideoPressed => return start_fetch(app, MediaKind::Video),
                FetchMessage::PullAudioPressed => return start_fetch(app, MediaKind::Audio),
                FetchMessage::SaveCopyPressed => {
                    if let Some(source) = app.view.completed_file.clone() {
                        let suggested = source
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        return Task::perform(
                            async move {
                                let target = rfd::AsyncFileDialog::new()
                                    .set_file_name(&suggested)
                                    .save_file()
                                    .await
                                    .map(|handle| handle.path().to_path_buf());
                                (target, source)
                            },
                            |(target, source)| Message::CopyTargetSelected(target, source),
                        );
                    }
                }
                _ => {}
            }
        }
        Message::FetchEvent(event) => match event {
            FetchEvent::Progress(ratio) => {
                app.view.fetch_progress = ratio;
                if ratio >= 1.0 {
                    app.view.status_message = "Download complete, finalizing...".to_string();
                } else {
                    app.view.status_message = format!("Downloading: {:.1}%", ratio * 100.0);
                }
            }
            FetchEvent::Completed(file) => {
                app.view.is_fetching = false;
                app.view.fetch_progress = 0.0;
                app.view.status_message = format!("Saved: {}", file.path.display());
                app.view.completed_file = Some(file.path);
            }
            FetchEvent::Failed(e) => {
                app.view.is_fetching = false;
                app.view.fetch_progress = 0.0;
                app.view.status_message = format!("Fetch failed: {}", e);
            }
        },
        Message::CopyTargetSelected(target_opt, source) => match target_opt {
            Some(target) => {
                app.view.status_message = format!("Copying to: {}", target.display());
                return Task::perform(
                    async move {
                        tokio::fs::copy(&source, &target)
                            .await
                            .map(|_| target)
                            .map_err(|e| e.to_string())
                    },
                    Message::CopyFinished,
                );
            }
            None => {
                app.view.status_message = "Save cancelled".to_string();
            }
        },
        Message::CopyFinished(result) => match result {
            Ok(target) => {
                app.view.status_message = format!("Copy saved: {}", target.display());
            }
            Err(e) => {
                app.view.status_message = format!("Failed to save copy: {}", e);
            }
        },
    }
    Task::none()
}

fn start_fetch(app: &mut DownloadApp, kind: MediaKind) -> Task<Message> {
    if app.view.media_url.trim().is_empty() || app.view.is_fetching {
        if !app.view.is_fetching {
            app.view.status_message = "Enter a media URL first".to_string();
        }
        return Task::none();
    }

    let url = app.view.media_url.clone();
    let custom_name = {
        let trimmed = app.view.custom_name.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };

    app.view.is_fetching = true;
    app.view.completed_file = None;
    app.view.status_message = format!("Fetching {}: {}", kind, url);

    let stream = match kind {
        MediaKind::Video => app.workflow.fetch_video(url, custom_name),
        MediaKind::Audio => app.workflow.fetch_audio(url, custom_name),
    };

    Task::stream(stream.map(Message::FetchEvent))
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
