// src/platforms/console.rs - Line-oriented chat connection over stdin/stdout
//
// Input lines look like `<chat_id> <user_id> <name> <text...>`. A text starting with `>>`
// is a forwarded message and a chat id equal to the sender id is a private chat.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashSet;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, Mutex};

use crate::platforms::ChatConnection;
use crate::types::{ChatId, ChatMessage, UserId};

type ConsoleInput = Box<dyn AsyncBufRead + Unpin + Send>;

pub struct ConsoleConnection {
    admins: HashSet<UserId>,
    input: Mutex<Option<ConsoleInput>>,
    message_sender: Option<broadcast::Sender<ChatMessage>>,
    output_lock: Mutex<()>,
}

impl ConsoleConnection {
    pub fn new(admin_user_ids: Vec<UserId>) -> Self {
        Self::with_input(admin_user_ids, BufReader::new(tokio::io::stdin()))
    }

    pub fn with_input<R>(admin_user_ids: Vec<UserId>, input: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let input: ConsoleInput = Box::new(input);
        let (tx, _) = broadcast::channel(1000);
        Self {
            admins: admin_user_ids.into_iter().collect(),
            input: Mutex::new(Some(input)),
            message_sender: Some(tx),
            output_lock: Mutex::new(()),
        }
    }

    /// Parse one input line into a chat message
    pub fn parse_line(line: &str) -> Option<ChatMessage> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let mut parts = line.splitn(4, char::is_whitespace);
        let chat_id: ChatId = parts.next()?.parse().ok()?;
        let user_id: UserId = parts.next()?.parse().ok()?;
        let name = parts.next()?;
        let text = parts.next().unwrap_or("").trim();

        let (is_forwarded, content) = match text.strip_prefix(">>") {
            Some(rest) => (true, rest.trim_start()),
            None => (false, text),
        };

        Some(ChatMessage {
            platform: "console".to_string(),
            chat_id,
            user_id,
            username: Some(name.to_string()),
            first_name: None,
            content: content.to_string(),
            timestamp: chrono::Utc::now(),
            is_private: chat_id == user_id,
            all_members_are_admins: false,
            is_forwarded,
        })
    }
}

#[async_trait]
impl ChatConnection for ConsoleConnection {
    async fn connect(&mut self) -> Result<()> {
        let input = self
            .input
            .get_mut()
            .take()
            .context("Console connection already started")?;
        let sender = self
            .message_sender
            .take()
            .context("Console connection already started")?;

        tokio::spawn(async move {
            let mut lines = input.lines();
            info!("Console reader started");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match Self::parse_line(&line) {
                        Some(message) => {
                            if let Err(e) = sender.send(message) {
                                warn!("Failed to broadcast message: {}", e);
                            }
                        }
                        None => debug!("Skipping console line: {}", line),
                    },
                    Ok(None) => {
                        info!("Console input closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Console read error: {}", e);
                        break;
                    }
                }
            }
        });

        info!("Console connection ready");
        Ok(())
    }

    async fn send_message(&self, chat_id: ChatId, message: &str) -> Result<()> {
        let _guard = self.output_lock.lock().await;
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("[{}] {}\n", chat_id, message).as_bytes())
            .await?;
        stdout.flush().await?;
        Ok(())
    }

    async fn is_user_admin(&self, _chat_id: ChatId, user_id: UserId) -> Result<bool> {
        Ok(self.admins.contains(&user_id))
    }

    fn platform_name(&self) -> &str {
        "console"
    }

    fn get_message_receiver(&self) -> Option<broadcast::Receiver<ChatMessage>> {
        self.message_sender.as_ref().map(|sender| sender.subscribe())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.message_sender = None;
        info!("Console connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_message() {
        let message = ConsoleConnection::parse_line("123 1 alice this is  spam").unwrap();
        assert_eq!(message.chat_id, 123);
        assert_eq!(message.user_id, 1);
        assert_eq!(message.display_name(), "alice");
        assert_eq!(message.content, "this is  spam");
        assert!(!message.is_private);
        assert!(!message.is_forwarded);
    }

    #[test]
    fn test_parse_private_and_forwarded() {
        let message = ConsoleConnection::parse_line("7 7 bob >> quoted text").unwrap();
        assert!(message.is_private);
        assert!(message.is_forwarded);
        assert_eq!(message.content, "quoted text");
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(ConsoleConnection::parse_line("").is_none());
        assert!(ConsoleConnection::parse_line("# comment").is_none());
        assert!(ConsoleConnection::parse_line("chat 1 alice hi").is_none());
        assert!(ConsoleConnection::parse_line("1 2").is_none());
    }

    #[tokio::test]
    async fn test_connect_broadcasts_input_then_closes() {
        let input: &'static [u8] = b"1 2 carol hello\n# skipped\n1 3 dave /words\n";
        let mut connection = ConsoleConnection::with_input(vec![3], input);
        let mut receiver = connection.get_message_receiver().unwrap();

        connection.connect().await.unwrap();

        assert_eq!(receiver.recv().await.unwrap().content, "hello");
        assert_eq!(receiver.recv().await.unwrap().content, "/words");
        assert!(receiver.recv().await.is_err());

        assert!(connection.is_user_admin(1, 3).await.unwrap());
        assert!(!connection.is_user_admin(1, 2).await.unwrap());
        assert!(connection.connect().await.is_err());
    }
}
