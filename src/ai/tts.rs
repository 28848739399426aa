use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::ai::audio;
use crate::config::AppConfig;
use crate::error::BotError;

/// Supported TTS engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsEngine {
    Piper,
    Xtts,
}

impl TtsEngine {
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "xtts" | "xtts-v2" => Self::Xtts,
            _ => Self::Piper,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Piper => "Piper (Fast/CPU)",
            Self::Xtts => "XTTS-v2 (Quality/GPU)",
        }
    }
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text` into an OGG/Opus voice note.
    async fn text_to_speech(&self, text: &str) -> Result<Vec<u8>, BotError>;
}

pub struct TtsManager {
    engine: TtsEngine,
    piper_path: String,
    piper_model_path: String,
    xtts_url: String,
    ffmpeg: String,
    http: reqwest::Client,
}

impl TtsManager {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            engine: config.default_tts_engine,
            piper_path: config.piper_path.clone(),
            piper_model_path: config.piper_model_path.clone(),
            xtts_url: config.xtts_sidecar_url.trim_end_matches('/').to_string(),
            ffmpeg: config.ffmpeg_path.clone(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
        })
    }

    pub fn engine(&self) -> TtsEngine {
        self.engine
    }

    /// Generate speech audio (WAV bytes) from text using the configured engine.
    async fn speak(&self, text: &str) -> Result<Vec<u8>, BotError> {
        match self.engine {
            TtsEngine::Piper => self.speak_piper(text).await,
            TtsEngine::Xtts => self.speak_xtts(text).await,
        }
    }

    /// Piper TTS: pipes text into the `piper` CLI and captures raw PCM from stdout.
    async fn speak_piper(&self, text: &str) -> Result<Vec<u8>, BotError> {
        let mut command = Command::new(&self.piper_path);
        command.args(["--model", &self.piper_model_path, "--output-raw"]);

        let output = audio::run_piped(command, text.as_bytes())
            .await
            .map_err(|e| BotError::Synthesis(format!("failed to run {}: {}", self.piper_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BotError::Synthesis(format!("piper failed: {}", stderr.trim())));
        }

        // Piper with --output-raw outputs raw PCM s16le 22050Hz mono.
        Ok(audio::pcm_to_wav(&output.stdout, 22050, 1, 16))
    }

    /// XTTS Sidecar: HTTP POST to the Python server.
    async fn speak_xtts(&self, text: &str) -> Result<Vec<u8>, BotError> {
        let resp = self
            .http
            .post(format!("{}/tts", self.xtts_url))
            .json(&serde_json::json!({
                "text": text,
                "language": "en"
            }))
            .send()
            .await
            .map_err(|e| BotError::Synthesis(format!("XTTS sidecar unreachable: {}", e)))?;

        if !resp.status().is_success() {
            let err_text = resp.text().await.unwrap_or_default();
            return Err(BotError::Synthesis(format!("XTTS sidecar error: {}", err_text)));
        }

        let wav_bytes = resp
            .bytes()
            .await
            .map_err(|e| BotError::Synthesis(format!("XTTS sidecar body: {}", e)))?;
        Ok(wav_bytes.to_vec())
    }
}

#[async_trait]
impl TextToSpeech for TtsManager {
    async fn text_to_speech(&self, text: &str) -> Result<Vec<u8>, BotError> {
        let spoken = speakable(text);
        if spoken.is_empty() {
            return Err(BotError::Synthesis("nothing to say".into()));
        }

        let wav = self.speak(&spoken).await?;
        audio::wav_to_ogg(&self.ffmpeg, &wav)
            .await
            .map_err(|e| BotError::Synthesis(e.to_string()))
    }
}

/// Strip markdown emphasis so the voice does not read out asterisks.
fn speakable(text: &str) -> String {
    text.replace(['*', '_', '`'], "").trim().to_string()
}
