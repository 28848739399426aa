//! Turn logic shared by the Telegram handlers, free of any transport types.

use crate::ai::stt::Transcription;
use crate::bot::AppState;
use crate::error::BotError;
use crate::style::stylize;

pub const WELCOME: &str = "Salom! Send text or voice. \
Use /voice to toggle voice replies. Use /clear to reset history.";
pub const UNRECOGNIZED: &str = "Sorry, couldn't understand the voice.";
pub const CLEARED: &str = "✅ Chat history and logs were successfully cleared.";
pub const FAILURE: &str = "⚠️ Something went wrong on my side. Please try again in a moment.";

/// What the bot sends back for one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// OGG/Opus voice note.
    Voice(Vec<u8>),
}

pub fn voice_status(enabled: bool) -> String {
    let status = if enabled { "enabled ✅" } else { "disabled ❌" };
    format!("Voice reply is now {}.", status)
}

/// Flip the user's voice-reply setting and describe the new state.
pub async fn toggle_voice(state: &AppState, user_id: &str) -> Result<String, BotError> {
    let enabled = state.store.toggle_voice(user_id).await?;
    tracing::info!("User {} voice replies {}", user_id, if enabled { "on" } else { "off" });
    Ok(voice_status(enabled))
}

pub async fn clear(state: &AppState, user_id: &str) -> Result<String, BotError> {
    state.store.clear_user(user_id).await?;
    Ok(CLEARED.to_string())
}

/// Run one conversational turn for text the user typed or said.
///
/// Order matters: the user entry is stored before the model is asked, and the
/// bot entry only once a reply exists. A failed completion therefore leaves the
/// user entry without an answer.
pub async fn text_turn(state: &AppState, user_id: &str, user_text: &str) -> Result<Reply, BotError> {
    state.store.append_history(user_id, user_text).await?;

    let raw_reply = state.llm.complete(user_id, user_text).await?;
    let reply = stylize(&raw_reply);

    state.store.append_transcript(user_id, user_text, &reply).await?;
    state.store.append_history(user_id, &reply).await?;

    if state.store.user(user_id).await?.voice_reply {
        let audio = state.tts.text_to_speech(&reply).await?;
        Ok(Reply::Voice(audio))
    } else {
        Ok(Reply::Text(reply))
    }
}

/// Transcribe a voice note and, if anything was understood, run a text turn.
pub async fn voice_turn(state: &AppState, user_id: &str, audio: &[u8]) -> Result<Reply, BotError> {
    match state.stt.speech_to_text(audio).await? {
        Transcription::Text(text) => {
            tracing::info!("Transcribed voice from user {}: {}", user_id, &text);
            text_turn(state, user_id, &text).await
        }
        Transcription::Unrecognized => {
            tracing::warn!("Voice note from user {} was not understood", user_id);
            Ok(Reply::Text(UNRECOGNIZED.to_string()))
        }
    }
}
