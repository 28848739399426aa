pub mod commands;
pub mod handlers;
pub mod pipeline;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::dptree;
use teloxide::prelude::*;

use crate::ai::{llm::LlmClient, stt::SpeechToText, tts::TextToSpeech};
use crate::config::AppConfig;
use crate::db::MemoryStore;

/// Shared application state, accessible from all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub store: MemoryStore,
    pub llm: LlmClient,
    pub stt: Box<dyn SpeechToText>,
    pub tts: Box<dyn TextToSpeech>,
}

pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type HandlerResult = Result<(), HandlerError>;

/// Build the teloxide update handler tree. Commands are tried before plain
/// messages so `/clear` and friends never reach the chat pipeline.
pub fn build_handler() -> UpdateHandler<HandlerError> {
    let command_handler = Update::filter_message()
        .filter_command::<commands::BotCommand>()
        .endpoint(commands::handle_command);

    let message_handler = Update::filter_message()
        .endpoint(handlers::handle_message);

    dptree::entry()
        .branch(command_handler)
        .branch(message_handler)
}
