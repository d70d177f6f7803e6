//! Bot loop: poll Telegram, answer commands.

use futures::StreamExt;
use std::sync::Arc;

use crate::commands::CommandHandler;
use crate::telegram::TelegramChannel;

/// Answer incoming commands until the polling stream ends. Each message is
/// handled on its own task so a slow GitHub lookup doesn't stall the chat.
pub async fn run_bot(channel: Arc<TelegramChannel>, handler: Arc<CommandHandler>) {
    match channel.get_me().await {
        Ok(me) => tracing::info!(
            "🤖 Telegram bot: @{} ({})",
            me.username.as_deref().unwrap_or("unknown"),
            me.first_name
        ),
        Err(e) => tracing::warn!("⚠️ Telegram getMe failed: {e}"),
    }

    let mut messages = channel.start_polling();
    while let Some(msg) = messages.next().await {
        let channel = channel.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            let Some(reply) = handler
                .handle(msg.chat_id, msg.username.as_deref(), &msg.text)
                .await
            else {
                return;
            };
            if let Err(e) = channel.send_message(msg.chat_id, &reply).await {
                tracing::warn!("⚠️ Reply to chat {} failed: {e}", msg.chat_id);
            }
        });
    }
    tracing::info!("Telegram bot loop ended");
}
