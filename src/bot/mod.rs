use anyhow::Result;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::config::BotConfiguration;
use crate::platforms::ChatConnection;
use crate::storage::UsageLedger;
use crate::types::ChatMessage;

pub mod commands;
pub mod message_processor;
pub mod word_cache;
pub mod word_matching;

#[cfg(test)]
pub(crate) mod test_support;

use commands::{parse_command, CommandRouter};
use message_processor::MessageProcessor;
use word_cache::WordCache;

/// Routes an inbound message to the command router or the message processor
#[derive(Clone)]
struct Dispatcher {
    command_router: Arc<CommandRouter>,
    message_processor: Arc<MessageProcessor>,
    command_prefix: String,
}

impl Dispatcher {
    async fn dispatch(&self, message: &ChatMessage, connection: &dyn ChatConnection) -> Result<()> {
        match parse_command(&message.content, &self.command_prefix) {
            Some(command) => {
                self.command_router
                    .process_command(&command, message, connection)
                    .await
            }
            None => {
                self.message_processor
                    .process_message(message, connection)
                    .await?;
                Ok(())
            }
        }
    }
}

/// Core bot engine that owns the connections and the ledger
pub struct ChatBot {
    connections: Arc<RwLock<HashMap<String, Box<dyn ChatConnection>>>>,
    ledger: Arc<UsageLedger>,
    dispatcher: Dispatcher,
}

impl ChatBot {
    pub fn new(ledger: Arc<UsageLedger>, config: &BotConfiguration) -> Self {
        let word_cache = Arc::new(WordCache::with_enabled(config.word_cache_enabled));
        let command_router = Arc::new(CommandRouter::new(
            Arc::clone(&ledger),
            Arc::clone(&word_cache),
            config.responses.clone(),
        ));
        let message_processor = Arc::new(MessageProcessor::new(
            Arc::clone(&ledger),
            word_cache,
            config.responses.clone(),
        ));

        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            ledger,
            dispatcher: Dispatcher {
                command_router,
                message_processor,
                command_prefix: config.command_prefix.clone(),
            },
        }
    }

    pub fn ledger(&self) -> Arc<UsageLedger> {
        Arc::clone(&self.ledger)
    }

    /// Add a platform connection to the bot
    pub async fn add_connection(&mut self, connection: Box<dyn ChatConnection>) {
        let platform_name = connection.platform_name().to_string();
        info!("Added {} connection", platform_name);
        self.connections.write().await.insert(platform_name, connection);
    }

    /// Handle one inbound message: commands go to the router, everything else is scored
    pub async fn handle_message(&self, message: &ChatMessage, connection: &dyn ChatConnection) -> Result<()> {
        self.dispatcher.dispatch(message, connection).await
    }

    /// Connect every platform and start processing its messages.
    /// The returned handles finish once the platform stops delivering messages.
    pub async fn start(&self) -> Result<Vec<JoinHandle<()>>> {
        info!("Starting chat bot...");
        let mut handles = Vec::new();

        let mut connections_guard = self.connections.write().await;
        for (platform_name, connection) in connections_guard.iter_mut() {
            let receiver = connection.get_message_receiver();

            if let Err(e) = connection.connect().await {
                error!("Failed to connect to {}: {}", platform_name, e);
                continue;
            }

            match receiver {
                Some(receiver) => {
                    handles.push(self.spawn_message_loop(receiver));
                    info!("Set up message receiver for {}", platform_name);
                }
                None => warn!("{} connection delivers no messages", platform_name),
            }
        }

        info!("Chat bot started with {} message loop(s)", handles.len());
        Ok(handles)
    }

    fn spawn_message_loop(&self, mut receiver: broadcast::Receiver<ChatMessage>) -> JoinHandle<()> {
        let connections = Arc::clone(&self.connections);
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        debug!(
                            "Processing message from user {} in chat {} sent at {}: {}",
                            message.user_id,
                            message.chat_id,
                            message.timestamp.format("%H:%M:%S"),
                            message.content
                        );

                        let connections_guard = connections.read().await;
                        let Some(connection) = connections_guard.get(&message.platform) else {
                            warn!("No connection found for platform: {}", message.platform);
                            continue;
                        };

                        if let Err(e) = dispatcher.dispatch(&message, connection.as_ref()).await {
                            error!(
                                "Failed to process message in chat {}: {:#}",
                                message.chat_id, e
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Message receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Message receiver closed");
                        break;
                    }
                }
            }
        })
    }

    /// Gracefully shutdown all connections
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down chat bot...");

        let mut connections_guard = self.connections.write().await;
        for (platform_name, connection) in connections_guard.iter_mut() {
            if let Err(e) = connection.disconnect().await {
                error!("Error disconnecting from {}: {}", platform_name, e);
            }
        }

        info!("Chat bot shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::console::ConsoleConnection;
    use crate::bot::test_support::{group_message, RecordingConnection};

    const CHAT: i64 = 123;
    const ADMIN: i64 = 42;

    fn bot() -> ChatBot {
        let ledger = Arc::new(UsageLedger::open_in_memory().unwrap());
        ChatBot::new(ledger, &BotConfiguration::default())
    }

    #[test_log::test(tokio::test)]
    async fn test_fine_and_amnesty_end_to_end() {
        let bot = bot();
        let connection = RecordingConnection::with_admins(vec![ADMIN]);

        bot.handle_message(&group_message(CHAT, ADMIN, "admin", "/add_word spam"), &connection)
            .await
            .unwrap();

        bot.handle_message(&group_message(CHAT, 1, "user", "this is spam spam"), &connection)
            .await
            .unwrap();
        assert_eq!(bot.ledger().get_user_score(CHAT, 1).unwrap(), 2);
        assert_eq!(
            connection.last_message().await.unwrap(),
            "Fined: 2 (spam, spam)\nTotal score: 2"
        );

        bot.handle_message(&group_message(CHAT, ADMIN, "admin", "/amnesty 1"), &connection)
            .await
            .unwrap();
        assert_eq!(
            connection.last_message().await.unwrap(),
            "user is forgiven for: spam"
        );
        assert_eq!(bot.ledger().get_user_score(CHAT, 1).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_amnesty_stops_at_previous_offender() {
        let bot = bot();
        let connection = RecordingConnection::with_admins(vec![ADMIN]);
        let say = |user_id: i64, text: &str| group_message(CHAT, user_id, &format!("u{}", user_id), text);

        bot.handle_message(&say(ADMIN, "/add_word spam"), &connection).await.unwrap();
        bot.handle_message(&say(1, "spam"), &connection).await.unwrap();
        bot.handle_message(&say(2, "spam spam"), &connection).await.unwrap();

        bot.handle_message(&say(ADMIN, "/amnesty 1"), &connection).await.unwrap();
        bot.handle_message(&say(ADMIN, "/amnesty 2"), &connection).await.unwrap();
        assert_eq!(connection.last_message().await.unwrap(), "u2 is forgiven for: spam");

        let ledger = bot.ledger();
        assert_eq!(ledger.get_user_score(CHAT, 1).unwrap(), 1);
        assert_eq!(ledger.get_user_score(CHAT, 2).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_console_pipeline_scores_messages() {
        let mut bot = bot();
        let input: &'static [u8] = b"\
123 42 admin /add_word spam, eggs
123 1 alice spam and EGGS!
123 1 alice >> spam forwarded
123 42 admin /amnesty 1
";
        bot.add_connection(Box::new(ConsoleConnection::with_input(vec![ADMIN], input)))
            .await;

        for handle in bot.start().await.unwrap() {
            handle.await.unwrap();
        }

        let ledger = bot.ledger();
        assert_eq!(ledger.get_user_score(CHAT, 1).unwrap(), 1);
        assert_eq!(ledger.usage_events(CHAT).unwrap().len(), 2);
        bot.shutdown().await.unwrap();
    }
}
