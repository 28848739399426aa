use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing_subscriber::EnvFilter;

mod ai;
mod bot;
mod config;
mod db;
mod error;
mod style;

#[cfg(test)]
mod test_support;

use bot::commands::BotCommand;
use config::AppConfig;
use db::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("🤖 Starting RedGPT bot...");

    // Load config
    let config = AppConfig::from_env()?;
    tracing::info!("Config loaded. Model: {}", config.model_id);

    // Prepare on-disk memory and transcript directory
    let store = MemoryStore::open(&config.memory_path, &config.log_dir).await?;
    tracing::info!(
        "Memory at {:?}, transcripts in {:?}",
        store.memory_path(),
        config.log_dir
    );

    // Initialize AI modules
    let stt_engine = ai::stt::SttEngine::new(
        &config.whisper_model_path,
        &config.stt_language,
        &config.ffmpeg_path,
    )?;
    let tts_manager = ai::tts::TtsManager::new(&config)?;
    tracing::info!("TTS engine: {}", tts_manager.engine().display_name());
    let llm_client = ai::llm::LlmClient::new(&config)?;

    // Build shared application state
    let state = Arc::new(bot::AppState {
        config: config.clone(),
        store,
        llm: llm_client,
        stt: Box::new(stt_engine),
        tts: Box::new(tts_manager),
    });

    // Create the Telegram bot
    let bot = Bot::new(&config.telegram_bot_token);

    if let Err(e) = bot.set_my_commands(BotCommand::bot_commands()).await {
        tracing::warn!("Could not register bot commands: {}", e);
    }

    // Build the dispatcher
    let handler = bot::build_handler();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
