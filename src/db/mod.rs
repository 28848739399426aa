pub mod models;
pub mod transcript;

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;

use crate::error::BotError;
use models::{MemoryDocument, UserRecord};
use transcript::TranscriptLog;

/// JSON-file backed user memory plus per-user transcripts.
///
/// Every mutation is a full load-modify-save of the memory document. The
/// `write_lock` serialises those cycles so overlapping turns cannot drop each
/// other's updates.
#[derive(Debug)]
pub struct MemoryStore {
    memory_path: PathBuf,
    transcripts: TranscriptLog,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    /// Prepare the on-disk layout: log directory and an empty `{}` document.
    pub async fn open(memory_path: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let memory_path = memory_path.into();
        let transcripts = TranscriptLog::new(log_dir);

        fs::create_dir_all(transcripts.dir()).await?;
        if let Some(parent) = memory_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        if fs::metadata(&memory_path).await.is_err() {
            fs::write(&memory_path, b"{}").await?;
            tracing::info!("Created empty memory document at {:?}", memory_path);
        }

        Ok(Self {
            memory_path,
            transcripts,
            write_lock: Mutex::new(()),
        })
    }

    pub fn memory_path(&self) -> &Path {
        &self.memory_path
    }

    #[cfg(test)]
    pub fn transcript_path(&self, user_id: &str) -> PathBuf {
        self.transcripts.path_for(user_id)
    }

    // ── Document Operations ────────────────────────────────────────

    /// Read the memory document. A missing or unparseable file yields an empty
    /// document; only genuine I/O failures are reported.
    pub async fn load(&self) -> Result<MemoryDocument, BotError> {
        let raw = match fs::read(&self.memory_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MemoryDocument::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&raw) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                tracing::warn!(
                    "Memory document {:?} is corrupt ({}); starting from empty",
                    self.memory_path,
                    e
                );
                Ok(MemoryDocument::new())
            }
        }
    }

    /// Replace the memory document. Writes a sibling temp file and renames it
    /// over the target so readers never observe a half-written document.
    pub async fn save(&self, doc: &MemoryDocument) -> Result<(), BotError> {
        let body = serde_json::to_vec_pretty(doc)?;
        let mut tmp = self.memory_path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &self.memory_path).await?;
        Ok(())
    }

    async fn update<T>(&self, f: impl FnOnce(&mut MemoryDocument) -> T) -> Result<T, BotError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        let out = f(&mut doc);
        self.save(&doc).await?;
        Ok(out)
    }

    // ── User Operations ────────────────────────────────────────────

    /// The user's record, or defaults if they have never talked to the bot.
    pub async fn user(&self, user_id: &str) -> Result<UserRecord, BotError> {
        Ok(self.load().await?.remove(user_id).unwrap_or_default())
    }

    pub async fn append_history(&self, user_id: &str, entry: &str) -> Result<(), BotError> {
        self.update(|doc| {
            doc.entry(user_id.to_string())
                .or_default()
                .chat_history
                .push(entry.to_string());
        })
        .await
    }

    /// Flip the voice-reply flag and return the new value.
    pub async fn toggle_voice(&self, user_id: &str) -> Result<bool, BotError> {
        self.update(|doc| {
            let record = doc.entry(user_id.to_string()).or_default();
            record.voice_reply = !record.voice_reply;
            record.voice_reply
        })
        .await
    }

    /// Forget the user entirely: memory record and transcript file.
    pub async fn clear_user(&self, user_id: &str) -> Result<(), BotError> {
        let existed = self.update(|doc| doc.remove(user_id).is_some()).await?;
        let had_log = self.transcripts.remove(user_id).await?;
        tracing::info!(
            "Cleared user {} (record: {}, transcript: {})",
            user_id,
            existed,
            had_log
        );
        Ok(())
    }

    pub async fn append_transcript(
        &self,
        user_id: &str,
        user_text: &str,
        bot_text: &str,
    ) -> Result<(), BotError> {
        self.transcripts.append(user_id, user_text, bot_text).await?;
        Ok(())
    }
}
