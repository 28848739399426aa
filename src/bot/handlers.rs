use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, ParseMode, Voice};
use teloxide::RequestError;

use crate::bot::pipeline::{self, Reply};
use crate::bot::{AppState, HandlerResult};
use crate::error::BotError;

/// Longest text Telegram accepts in a single message, in UTF-16 code units.
pub const TELEGRAM_TEXT_LIMIT: usize = 4096;

/// Memory key for the sender of `msg`. Updates without a sender (channel posts) have none.
pub fn user_key(msg: &Message) -> Option<String> {
    msg.from.as_ref().map(|u| u.id.0.to_string())
}

/// Main message handler for both voice and text messages.
pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> HandlerResult {
    let Some(user_id) = user_key(&msg) else {
        return Ok(());
    };

    let outcome = if let Some(voice) = msg.voice() {
        show_typing(&bot, msg.chat.id).await;
        tracing::info!("Voice message from user {}", user_id);
        match download_voice(&bot, voice).await {
            Ok(audio) => pipeline::voice_turn(&state, &user_id, &audio).await,
            Err(e) => Err(e),
        }
    } else if let Some(text) = msg.text() {
        show_typing(&bot, msg.chat.id).await;
        tracing::info!("Text message from user {}", user_id);
        pipeline::text_turn(&state, &user_id, text).await
    } else {
        // Unsupported message type
        return Ok(());
    };

    let reply = outcome.unwrap_or_else(|e| {
        tracing::error!("Turn for user {} dropped: {}", user_id, e);
        Reply::Text(pipeline::FAILURE.to_string())
    });

    reply_with(&bot, msg.chat.id, reply).await?;
    Ok(())
}

/// The typing indicator is cosmetic; a failure must not cost the user their reply.
async fn show_typing(bot: &Bot, chat_id: ChatId) {
    if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
        tracing::warn!("Typing indicator for chat {} failed: {}", chat_id.0, e);
    }
}

async fn download_voice(bot: &Bot, voice: &Voice) -> Result<Vec<u8>, BotError> {
    let file = bot
        .get_file(voice.file.id.clone())
        .await
        .map_err(|e| BotError::Transport(format!("getFile failed: {}", e)))?;

    let mut buf = Vec::new();
    bot.download_file(&file.path, &mut buf)
        .await
        .map_err(|e| BotError::Transport(format!("voice download failed: {}", e)))?;
    Ok(buf)
}

/// Send a reply. Long text is split into Telegram-sized chunks, each sent as
/// Markdown and re-sent plain if Telegram rejects the markup. If a chunk
/// cannot be delivered at all the user gets the generic failure notice.
pub async fn reply_with(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<(), RequestError> {
    match reply {
        Reply::Text(text) => {
            for chunk in split_message(&text, TELEGRAM_TEXT_LIMIT) {
                if let Err(e) = send_text(bot, chat_id, &chunk).await {
                    tracing::error!("Failed to deliver reply to chat {}: {}", chat_id.0, e);
                    bot.send_message(chat_id, pipeline::FAILURE).await?;
                    break;
                }
            }
        }
        Reply::Voice(audio) => {
            let voice = InputFile::memory(audio).file_name("reply.ogg");
            bot.send_voice(chat_id, voice).await?;
        }
    }
    Ok(())
}

async fn send_text(bot: &Bot, chat_id: ChatId, text: &str) -> Result<(), RequestError> {
    // Telegram's legacy Markdown marks bold with a single asterisk
    let markdown = text.replace("**", "*");
    #[allow(deprecated)]
    let styled = bot
        .send_message(chat_id, markdown)
        .parse_mode(ParseMode::Markdown)
        .await;
    match styled {
        Ok(_) => Ok(()),
        Err(RequestError::Api(e)) => {
            tracing::warn!("Telegram rejected reply markup ({}); sending plain text", e);
            bot.send_message(chat_id, text).await?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Split `text` into pieces of at most `limit` UTF-16 code units, breaking
/// after the last newline of a piece when there is one. Whitespace-only
/// pieces are dropped.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut units = 0;

    for ch in text.chars() {
        let width = ch.len_utf16();
        if units + width > limit && !current.is_empty() {
            let rest = match current.rfind('\n') {
                Some(i) if i > 0 => current.split_off(i + 1),
                _ => String::new(),
            };
            chunks.push(std::mem::replace(&mut current, rest));
            units = current.encode_utf16().count();
        }
        current.push(ch);
        units += width;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks.retain(|chunk| !chunk.trim().is_empty());
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_stub;
    use axum::extract::State;
    use axum::http::{StatusCode, Uri};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<(String, Value)>>>;

    /// Telegram Bot API stand-in that records every call and rejects it.
    async fn rejecting_telegram(description: &'static str) -> (Bot, Calls) {
        let calls: Calls = Arc::default();
        let router = Router::new()
            .fallback(
                move |State(calls): State<Calls>, uri: Uri, body: String| async move {
                    let method = uri.path().rsplit('/').next().unwrap_or_default().to_lowercase();
                    let body = serde_json::from_str(&body).unwrap_or(Value::Null);
                    calls.lock().unwrap().push((method, body));
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"ok": false, "error_code": 400, "description": description})),
                    )
                },
            )
            .with_state(calls.clone());
        let base = spawn_stub(router).await;
        let bot = Bot::new("123:test").set_api_url(reqwest::Url::parse(&base).unwrap());
        (bot, calls)
    }

    fn utf16_len(s: &str) -> usize {
        s.encode_utf16().count()
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(split_message("hey there", TELEGRAM_TEXT_LIMIT), vec!["hey there"]);
        assert!(split_message("", TELEGRAM_TEXT_LIMIT).is_empty());
    }

    #[test]
    fn long_text_is_split_at_the_limit() {
        let text = "a".repeat(5000);
        let chunks = split_message(&text, TELEGRAM_TEXT_LIMIT);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn split_prefers_line_breaks() {
        assert_eq!(split_message("aaa\nbbbb", 6), vec!["aaa\n", "bbbb"]);
        assert_eq!(split_message("aaaaaaaa", 6), vec!["aaaaaa", "aa"]);
    }

    #[test]
    fn split_never_cuts_through_a_character() {
        // Each emoji is two UTF-16 units, so an odd limit cannot be filled exactly
        let text = "😀".repeat(3000);
        let chunks = split_message(&text, 4095);
        assert!(chunks.iter().all(|c| utf16_len(c) <= 4095));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn whitespace_only_chunks_are_dropped() {
        let text = format!("{}{}", "x".repeat(10), " ".repeat(10));
        assert_eq!(split_message(&text, 10), vec!["x".repeat(10)]);
    }

    #[tokio::test]
    async fn undeliverable_reply_falls_back_to_failure_notice() {
        let (bot, calls) = rejecting_telegram("Bad Request: message is too long").await;
        let text = "a".repeat(5000);

        let result = reply_with(&bot, ChatId(7), Reply::Text(text)).await;
        // The failure notice is rejected too, which surfaces as the error
        assert!(matches!(result, Err(RequestError::Api(_))), "got {result:?}");

        let calls = calls.lock().unwrap();
        let texts: Vec<&str> = calls
            .iter()
            .map(|(method, body)| {
                assert_eq!(method, "sendmessage");
                assert_eq!(body["chat_id"], 7);
                body["text"].as_str().unwrap()
            })
            .collect();
        assert_eq!(texts.len(), 3);
        assert_eq!(utf16_len(texts[0]), TELEGRAM_TEXT_LIMIT);
        assert_eq!(calls[0].1["parse_mode"], "Markdown");
        assert_eq!(texts[1], texts[0]);
        assert!(calls[1].1.get("parse_mode").is_none());
        assert_eq!(texts[2], pipeline::FAILURE);
    }

    #[tokio::test]
    async fn failed_typing_indicator_is_not_fatal() {
        let (bot, calls) = rejecting_telegram("Bad Request: chat not found").await;

        show_typing(&bot, ChatId(7)).await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "sendchataction");
        assert_eq!(calls[0].1["action"], "typing");
    }
}
