use std::path::PathBuf;

use iced::{
    widget::{button, column, row, text, text_input, Space},
    Element, Length,
};

/// Main view state
pub struct FetchView {
    pub media_url: String,
    pub custom_name: String,
    pub status_message: String,
    pub is_fetching: bool,
    pub fetch_progress: f32,
    pub completed_file: Option<PathBuf>,
}

impl Default for FetchView {
    fn default() -> Self {
        Self {
            media_url: String::new(),
            custom_name: String::new(),
            status_message: "Enter a media URL to download".to_string(),
            is_fetching: false,
            fetch_progress: 0.0,
            completed_file: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FetchMessage {
    MediaUrlChanged(String),
    CustomNameChanged(String),
    PullVideoPressed,
    PullAudioPressed,
    SaveCopyPressed,
}

impl FetchView {
    pub fn update(&mut self, message: FetchMessage) {
        match message {
            FetchMessage::MediaUrlChanged(url) => {
                self.media_url = url;
            }
            FetchMessage::CustomNameChanged(name) => {
                self.custom_name = name;
            }
            FetchMessage::PullVideoPressed
            | FetchMessage::PullAudioPressed
            | FetchMessage::SaveCopyPressed => {
                // Handled by the app
            }
        }
    }

    pub fn view(&self) -> Element<'_, FetchMessage> {
        let mut content = column![
            text("Media Downloader").size(32),
            Space::new().height(Length::Fixed(20.0)),
            text("Media URL:").size(16),
            text_input("Enter the video URL...", &self.media_url)
                .on_input(FetchMessage::MediaUrlChanged)
                .padding(10),
            text("Custom name (optional):").size(16),
            text_input("Leave empty to keep the source title...", &self.custom_name)
                .on_input(FetchMessage::CustomNameChanged)
                .padding(10),
            Space::new().height(Length::Fixed(10.0)),
            text(&self.status_message).size(14),
            Space::new().height(Length::Fixed(20.0)),
            row![
                button("Pull Video")
                    .on_press(FetchMessage::PullVideoPressed)
                    .padding([10, 20]),
                button("Pull Audio")
                    .on_press(FetchMessage::PullAudioPressed)
                    .padding([10, 20]),
            ]
            .spacing(10),
        ]
        .padding(20)
        .spacing(10);

        if self.completed_file.is_some() {
            content = content.push(
                button("Save a copy...")
                    .on_press(FetchMessage::SaveCopyPressed)
                    .padding([10, 20]),
            );
        }

        content.into()
    }
}
