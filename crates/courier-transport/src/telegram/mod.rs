//! Telegram Bot API transport.

mod client;

pub use client::{TelegramClient, TelegramClientBuilder};
