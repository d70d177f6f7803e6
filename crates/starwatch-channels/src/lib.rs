//! # Starwatch Channels
//! Telegram delivery for star alerts, plus the bot commands subscribers use
//! to manage what they watch.

pub mod bot;
pub mod commands;
pub mod telegram;
pub mod templates;

pub use bot::run_bot;
pub use commands::{Command, CommandHandler};
pub use telegram::TelegramChannel;
