use thiserror::Error;

/// Failures that abort a single chat turn.
///
/// None of these are fatal to the process: the dispatch layer logs them and
/// answers the user with a generic failure message.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("completion API failed: {0}")]
    Upstream(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("audio transcoding failed: {0}")]
    Transcode(String),

    #[error("speech recognition failed: {0}")]
    Recognition(String),

    #[error("telegram transport failed: {0}")]
    Transport(String),

    #[error("storage I/O failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("failed to encode memory document: {0}")]
    Encode(#[from] serde_json::Error),
}
