use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::types::{ChatId, ChatMessage, UserId};

pub mod console;

/// Chat capability the bot needs from a messaging platform
#[async_trait]
pub trait ChatConnection: Send + Sync {
    /// Connect to the platform and start receiving messages
    async fn connect(&mut self) -> Result<()>;

    /// Send a message to the specified chat
    async fn send_message(&self, chat_id: ChatId, message: &str) -> Result<()>;

    /// Whether the user administers the chat
    async fn is_user_admin(&self, chat_id: ChatId, user_id: UserId) -> Result<bool>;

    /// Get the platform identifier (e.g., "console")
    fn platform_name(&self) -> &str;

    /// Get a receiver for incoming messages. Subscribe before connecting to see every message.
    fn get_message_receiver(&self) -> Option<broadcast::Receiver<ChatMessage>>;

    /// Gracefully disconnect
    async fn disconnect(&mut self) -> Result<()>;
}
