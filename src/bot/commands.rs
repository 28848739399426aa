use std::sync::Arc;
use teloxide::macros::BotCommands;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands as _;

use crate::bot::handlers::{reply_with, user_key};
use crate::bot::pipeline::{self, Reply};
use crate::bot::{AppState, HandlerResult};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum BotCommand {
    #[command(description = "Start / restart the bot")]
    Start,
    #[command(description = "Toggle voice replies on or off")]
    Voice,
    #[command(description = "Forget chat history and delete logs")]
    Clear,
    #[command(description = "Show help")]
    Help,
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: BotCommand,
    state: Arc<AppState>,
) -> HandlerResult {
    let Some(user_id) = user_key(&msg) else {
        return Ok(());
    };

    let outcome = match cmd {
        BotCommand::Start => Ok(pipeline::WELCOME.to_string()),
        BotCommand::Voice => pipeline::toggle_voice(&state, &user_id).await,
        BotCommand::Clear => pipeline::clear(&state, &user_id).await,
        BotCommand::Help => Ok(format!(
            "{}\n\nModel: {}",
            BotCommand::descriptions(),
            state.config.model_id
        )),
    };

    let text = outcome.unwrap_or_else(|e| {
        tracing::error!("Command from user {} failed: {}", user_id, e);
        pipeline::FAILURE.to_string()
    });

    reply_with(&bot, msg.chat.id, Reply::Text(text)).await?;
    Ok(())
}
