//! Trip Bot
//!
//! A small Telegram bot showing commands, inline keyboards, callbacks and a
//! two-step conversation.
//!
//! | Input          | Behavior                                         |
//! |----------------|--------------------------------------------------|
//! | `/start`       | Greets the user                                  |
//! | `/menu`        | Sends a message with two inline buttons          |
//! | button press   | Edits that message to say which button was hit   |
//! | `/convo`       | Asks for two strings, then prints both           |
//! | `/cancel`      | Aborts a running `/convo`                        |
//! | any other text | Echoes it back                                   |
//!
//! # Usage
//!
//! ```bash
//! TELEGRAM_BOT_TOKEN=123:abc cargo run --package trip-bot
//! ```

mod conversation;

use anyhow::Result;
use tracing::{info, warn};

use courier::prelude::*;

use crate::conversation::DemoConversation;

fn menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new().row([
        InlineKeyboardButton::callback("Option 1", "opt_1"),
        InlineKeyboardButton::callback("Option 2", "opt_2"),
    ])
}

async fn start(bot: BoxedBot, msg: MessageEvent) -> ApiResult<()> {
    info!(chat_id = msg.chat_id, from = %msg.sender_display_name, "Received /start");
    bot.send_message(msg.chat_id, "Hello! I am your Friends Trip Bot.", None, None)
        .await?;
    Ok(())
}

async fn menu(bot: BoxedBot, msg: MessageEvent) -> ApiResult<()> {
    bot.send_message(
        msg.chat_id,
        "Please choose an option:",
        Some(&menu_keyboard()),
        None,
    )
    .await?;
    Ok(())
}

async fn convo(
    bot: BoxedBot,
    conversations: ConversationRegistry,
    msg: MessageEvent,
) -> ApiResult<()> {
    let key = ConversationKey::new(msg.chat_id, msg.user_id);
    if let Registration::Replaced { .. } =
        conversations.register(DemoConversation::new(key, bot.clone()))
    {
        info!(%key, "Restarted conversation");
    }
    bot.send_message(msg.chat_id, "Please enter string 1:", None, None)
        .await?;
    Ok(())
}

async fn on_button(bot: BoxedBot, query: CallbackQueryEvent) -> ApiResult<()> {
    info!(data = %query.data, from = %query.sender_display_name, "Received callback");

    if let Err(e) = bot.answer_callback_query(&query.query_id, None, false).await {
        warn!(error = %e, "Failed to answer callback query");
    }
    bot.edit_message(
        query.chat_id,
        query.message_id,
        &format!("{} pressed", query.data),
        Some(&menu_keyboard()),
        None,
    )
    .await
}

async fn echo(bot: BoxedBot, msg: MessageEvent) -> ApiResult<()> {
    bot.send_message(msg.chat_id, &format!("You said: {}", msg.text), None, None)
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let runtime = CourierRuntime::builder()
        .search_path(std::env::current_dir()?)
        .search_path(env!("CARGO_MANIFEST_DIR"))
        .build()?
        .command("/start", start)
        .command("/menu", menu)
        .command("/convo", convo)
        .callback(on_button)
        .text(echo);

    let offset = runtime.run().await?;
    info!(offset, "Bye");
    Ok(())
}
