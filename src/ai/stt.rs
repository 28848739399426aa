use std::path::Path;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::ai::audio;
use crate::error::BotError;

/// Result of running speech recognition on a voice note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcription {
    Text(String),
    /// Nothing intelligible was heard. Not an error: the user gets a polite retry prompt.
    Unrecognized,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe a Telegram voice note (OGG/Opus bytes).
    async fn speech_to_text(&self, audio: &[u8]) -> Result<Transcription, BotError>;
}

pub struct SttEngine {
    ctx: Arc<WhisperContext>,
    language: String,
    ffmpeg: String,
}

impl SttEngine {
    pub fn new(model_path: &str, language: &str, ffmpeg: &str) -> anyhow::Result<Self> {
        if !Path::new(model_path).exists() {
            anyhow::bail!(
                "Whisper model not found at '{}'. Download it from: \
                 https://huggingface.co/ggerganov/whisper.cpp/tree/main",
                model_path
            );
        }

        let ctx = WhisperContext::new_with_params(model_path, WhisperContextParameters::default())
            .map_err(|e| anyhow::anyhow!("Failed to load whisper model: {}", e))?;

        tracing::info!("Whisper STT model loaded from '{}'", model_path);
        Ok(Self {
            ctx: Arc::new(ctx),
            language: language.to_string(),
            ffmpeg: ffmpeg.to_string(),
        })
    }
}

#[async_trait]
impl SpeechToText for SttEngine {
    async fn speech_to_text(&self, audio: &[u8]) -> Result<Transcription, BotError> {
        let pcm = audio::ogg_to_pcm(&self.ffmpeg, audio).await?;
        if pcm.is_empty() {
            return Ok(Transcription::Unrecognized);
        }

        let ctx = self.ctx.clone();
        let language = self.language.clone();
        let raw = tokio::task::spawn_blocking(move || transcribe(&ctx, &pcm, &language))
            .await
            .map_err(|e| BotError::Recognition(format!("whisper task panicked: {}", e)))??;

        Ok(classify(&raw))
    }
}

/// Transcribe raw PCM f32 audio data (16kHz mono) to text.
fn transcribe(ctx: &WhisperContext, pcm_data: &[f32], language: &str) -> Result<String, BotError> {
    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(Some(language));
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    params.set_n_threads(2);

    let mut state = ctx
        .create_state()
        .map_err(|e| BotError::Recognition(format!("failed to create whisper state: {}", e)))?;

    state
        .full(params, pcm_data)
        .map_err(|e| BotError::Recognition(format!("whisper transcription failed: {}", e)))?;

    let num_segments = state
        .full_n_segments()
        .map_err(|e| BotError::Recognition(format!("failed to get segments: {}", e)))?;

    let mut text = String::new();
    for i in 0..num_segments {
        if let Ok(segment) = state.full_get_segment_text(i) {
            text.push_str(&segment);
            text.push(' ');
        }
    }

    Ok(text.trim().to_string())
}

/// Whisper fills silence with markers like `[BLANK_AUDIO]` or `(wind blowing)`.
/// A transcript made only of those counts as unrecognized.
pub fn classify(raw: &str) -> Transcription {
    static MARKERS: OnceLock<Regex> = OnceLock::new();
    let markers = MARKERS.get_or_init(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)").expect("static regex"));

    let cleaned = markers.replace_all(raw, " ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().any(char::is_alphanumeric) {
        Transcription::Text(cleaned)
    } else {
        Transcription::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_speech_is_text() {
        assert_eq!(
            classify(" what's the weather  like "),
            Transcription::Text("what's the weather like".into())
        );
    }

    #[test]
    fn silence_markers_are_unrecognized() {
        assert_eq!(classify(""), Transcription::Unrecognized);
        assert_eq!(classify("[BLANK_AUDIO]"), Transcription::Unrecognized);
        assert_eq!(classify(" (wind blowing) [MUSIC] ..."), Transcription::Unrecognized);
    }

    #[test]
    fn markers_are_stripped_from_real_speech() {
        assert_eq!(
            classify("[BLANK_AUDIO] hello there"),
            Transcription::Text("hello there".into())
        );
    }
}
