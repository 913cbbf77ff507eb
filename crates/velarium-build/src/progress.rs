use crate::model::LogChunk;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// ターミナル用のビルド進捗スピナー
pub struct BuildProgress {
    progress_bar: ProgressBar,
}

impl BuildProgress {
    pub fn new(tag: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(format!("Building {}...", tag));
        pb.enable_steady_tick(Duration::from_millis(120));

        Self { progress_bar: pb }
    }

    /// ログをスピナーの上に表示
    pub fn print_log(&self, log: &[LogChunk]) {
        for chunk in log {
            let line = chunk
                .stream
                .as_deref()
                .or(chunk.status.as_deref())
                .unwrap_or_default()
                .trim_end();
            if !line.is_empty() {
                self.progress_bar.println(line);
            }
        }
    }

    pub fn finish_cached(&self, image_id: &str) {
        self.progress_bar
            .finish_with_message(format!("Using cached image {} ✓", image_id));
    }

    pub fn finish_success(&self, image_id: &str) {
        self.progress_bar
            .finish_with_message(format!("Build completed: {} ✓", image_id));
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .finish_with_message(format!("Build failed: {}", error));
    }
}
