use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Plain-text conversation log, one file per user under `log_dir`.
#[derive(Debug, Clone)]
pub struct TranscriptLog {
    log_dir: PathBuf,
}

impl TranscriptLog {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn path_for(&self, user_id: &str) -> PathBuf {
        self.log_dir.join(format!("{}.txt", user_id))
    }

    pub fn dir(&self) -> &Path {
        &self.log_dir
    }

    pub async fn append(&self, user_id: &str, user_text: &str, bot_text: &str) -> std::io::Result<()> {
        let block = format_entry(Local::now(), user_text, bot_text);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(user_id))
            .await?;
        file.write_all(block.as_bytes()).await?;
        file.flush().await
    }

    /// Delete the user's log. Returns false when there was nothing to delete.
    pub async fn remove(&self, user_id: &str) -> std::io::Result<bool> {
        match fs::remove_file(self.path_for(user_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

pub fn format_entry(at: DateTime<Local>, user_text: &str, bot_text: &str) -> String {
    format!(
        "[{}]\nYou: {}\nAI: {}\n\n",
        at.format("%Y-%m-%d %H:%M:%S"),
        user_text,
        bot_text
    )
}
