use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::ai::tts::TtsEngine;

const DEFAULT_SYSTEM_PROMPT: &str = "You're a Gen Z assistant with big brother vibes. \
Be chill, casual, and real. Use **bold**, *italics*, and natural emojis if they add something. \
No cringe, just smart and helpful.";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub openrouter_api_key: String,
    pub model_id: String,

    /// Base URL of the OpenAI-compatible API, without the `/chat/completions` suffix
    pub api_base_url: String,
    /// Sent as `HTTP-Referer` so OpenRouter can attribute traffic to the bot
    pub http_referer: String,
    pub system_prompt: String,

    pub memory_path: PathBuf,
    pub log_dir: PathBuf,

    pub llm_timeout: Duration,
    pub llm_max_retries: u32,
    pub llm_retry_backoff: Duration,

    pub ffmpeg_path: String,

    /// Path to the GGML whisper model file
    pub whisper_model_path: String,
    pub stt_language: String,

    pub default_tts_engine: TtsEngine,
    pub piper_path: String,
    pub piper_model_path: String,
    pub xtts_sidecar_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).with_context(|| format!("missing required environment variable {key}"))
        };
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| -> anyhow::Result<u64> {
            match get(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'")),
                None => Ok(default),
            }
        };

        Ok(Self {
            telegram_bot_token: required("BOT_TOKEN")?,
            openrouter_api_key: required("OPENROUTER_API_KEY")?,
            model_id: required("MODEL_ID")?,
            api_base_url: or("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1")
                .trim_end_matches('/')
                .to_string(),
            http_referer: or("HTTP_REFERER", "https://t.me/RedGPTrobot"),
            system_prompt: or("SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
            memory_path: PathBuf::from(or("MEMORY_PATH", "memory.json")),
            log_dir: PathBuf::from(or("LOG_DIR", "logs")),
            llm_timeout: Duration::from_secs(number("LLM_TIMEOUT_SECS", 60)?),
            llm_max_retries: u32::try_from(number("LLM_MAX_RETRIES", 2)?)
                .context("LLM_MAX_RETRIES is out of range")?,
            llm_retry_backoff: Duration::from_millis(number("LLM_RETRY_BACKOFF_MS", 500)?),
            ffmpeg_path: or("FFMPEG_PATH", "ffmpeg"),
            whisper_model_path: or(
                "WHISPER_MODEL_PATH",
                "./data/models/whisper/ggml-base.en.bin",
            ),
            stt_language: or("STT_LANGUAGE", "en"),
            default_tts_engine: TtsEngine::from_str_loose(&or("DEFAULT_TTS_ENGINE", "piper")),
            piper_path: or("PIPER_PATH", "piper"),
            piper_model_path: or(
                "PIPER_MODEL_PATH",
                "./data/models/piper/en_US-amy-medium.onnx",
            ),
            xtts_sidecar_url: or("XTTS_SIDECAR_URL", "http://localhost:8020"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("BOT_TOKEN", "123:abc"),
        ("OPENROUTER_API_KEY", "sk-test"),
        ("MODEL_ID", "mistralai/mistral-7b-instruct"),
    ];

    #[test]
    fn defaults_fill_optional_settings() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.model_id, "mistralai/mistral-7b-instruct");
        assert_eq!(config.api_base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.http_referer, "https://t.me/RedGPTrobot");
        assert_eq!(config.memory_path, PathBuf::from("memory.json"));
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.llm_max_retries, 2);
        assert_eq!(config.default_tts_engine, TtsEngine::Piper);
        assert!(config.system_prompt.contains("big brother vibes"));
    }

    #[test]
    fn missing_required_setting_names_the_variable() {
        let err = AppConfig::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("MODEL_ID"));
    }

    #[test]
    fn blank_required_setting_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[0] = ("BOT_TOKEN", "   ");
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("OPENROUTER_BASE_URL", "http://127.0.0.1:9000/v1/"),
            ("LLM_MAX_RETRIES", "0"),
            ("LLM_RETRY_BACKOFF_MS", "10"),
            ("DEFAULT_TTS_ENGINE", "XTTS"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000/v1");
        assert_eq!(config.llm_max_retries, 0);
        assert_eq!(config.llm_retry_backoff, Duration::from_millis(10));
        assert_eq!(config.default_tts_engine, TtsEngine::Xtts);
    }

    #[test]
    fn oversized_retry_count_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("LLM_MAX_RETRIES", "5000000000"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("LLM_MAX_RETRIES"));
    }

    #[test]
    fn malformed_number_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("LLM_TIMEOUT_SECS", "soon"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("LLM_TIMEOUT_SECS"));
    }
}
