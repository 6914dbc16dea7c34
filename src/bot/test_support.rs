use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::{broadcast, Mutex};

use crate::platforms::ChatConnection;
use crate::types::{ChatId, ChatMessage, UserId};

/// Chat connection that records everything the bot sends
pub struct RecordingConnection {
    admins: HashSet<UserId>,
    sent: Mutex<Vec<(ChatId, String)>>,
}

impl RecordingConnection {
    pub fn with_admins(admins: Vec<UserId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub async fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn last_message(&self) -> Option<String> {
        self.sent.lock().await.last().map(|(_, text)| text.clone())
    }
}

#[async_trait]
impl ChatConnection for RecordingConnection {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, chat_id: ChatId, message: &str) -> Result<()> {
        self.sent.lock().await.push((chat_id, message.to_string()));
        Ok(())
    }

    async fn is_user_admin(&self, _chat_id: ChatId, user_id: UserId) -> Result<bool> {
        Ok(self.admins.contains(&user_id))
    }

    fn platform_name(&self) -> &str {
        "recording"
    }

    fn get_message_receiver(&self) -> Option<broadcast::Receiver<ChatMessage>> {
        None
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn group_message(chat_id: ChatId, user_id: UserId, username: &str, content: &str) -> ChatMessage {
    ChatMessage {
        platform: "recording".to_string(),
        chat_id,
        user_id,
        username: Some(username.to_string()),
        first_name: None,
        content: content.to_string(),
        timestamp: chrono::Utc::now(),
        is_private: false,
        all_members_are_admins: false,
        is_forwarded: false,
    }
}
