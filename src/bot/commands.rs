use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::bot::word_cache::WordCache;
use crate::config::ResponseTemplates;
use crate::platforms::ChatConnection;
use crate::storage::UsageLedger;
use crate::types::{ChatMessage, LedgerResult};

/// Shortest word accepted by `add_word`
const MIN_WORD_CHARS: usize = 2;

/// Command keyword and its argument, split out of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub name: String,
    pub argument: &'a str,
}

/// Split `/name@bot argument` into its parts. Returns `None` for non-command text.
pub fn parse_command<'a>(text: &'a str, prefix: &str) -> Option<ParsedCommand<'a>> {
    let body = text.strip_prefix(prefix)?;
    let (head, argument) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
    let name = head.split('@').next().unwrap_or_default().to_lowercase();

    Some(ParsedCommand {
        name,
        argument: argument.trim(),
    })
}

/// Commands understood by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationCommand {
    AddWord,
    RemoveWord,
    Words,
    Score,
    Amnesty,
}

impl ModerationCommand {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "add_word" => Some(Self::AddWord),
            "remove_word" => Some(Self::RemoveWord),
            "words" => Some(Self::Words),
            "score" => Some(Self::Score),
            "amnesty" => Some(Self::Amnesty),
            _ => None,
        }
    }

    pub fn requires_admin(&self) -> bool {
        matches!(self, Self::AddWord | Self::RemoveWord | Self::Amnesty)
    }
}

/// Comma separated word list, trimmed, dropping words shorter than `min_chars`
fn split_word_list(argument: &str, min_chars: usize) -> Vec<String> {
    argument
        .split(',')
        .map(str::trim)
        .filter(|word| word.chars().count() >= min_chars)
        .map(str::to_string)
        .collect()
}

pub struct CommandRouter {
    ledger: Arc<UsageLedger>,
    word_cache: Arc<WordCache>,
    responses: ResponseTemplates,
}

impl CommandRouter {
    pub fn new(ledger: Arc<UsageLedger>, word_cache: Arc<WordCache>, responses: ResponseTemplates) -> Self {
        Self {
            ledger,
            word_cache,
            responses,
        }
    }

    /// Run a parsed command and send its reply to the chat
    pub async fn process_command(
        &self,
        command: &ParsedCommand<'_>,
        message: &ChatMessage,
        connection: &dyn ChatConnection,
    ) -> Result<()> {
        let chat_id = message.chat_id;

        let Some(kind) = ModerationCommand::from_keyword(&command.name) else {
            debug!("Unknown command: {}", command.name);
            return connection
                .send_message(chat_id, &self.responses.unknown_command)
                .await;
        };

        if kind.requires_admin() && !self.is_sender_admin(message, connection).await {
            debug!(
                "User {} attempted admin command '{}' in chat {}",
                message.user_id, command.name, chat_id
            );
            return connection
                .send_message(chat_id, &self.responses.no_authority)
                .await;
        }

        info!(
            "Executing command '{}' for user {} in chat {}",
            command.name, message.user_id, chat_id
        );

        let outcome = match kind {
            ModerationCommand::AddWord => self.handle_add_words(message, command.argument).await,
            ModerationCommand::RemoveWord => self.handle_remove_words(message, command.argument).await,
            ModerationCommand::Words => self.handle_list_words(message),
            ModerationCommand::Score => self.handle_scores(message),
            ModerationCommand::Amnesty => self.handle_amnesty(message, command.argument),
        };

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                error!("Command '{}' failed in chat {}: {}", command.name, chat_id, e);
                self.responses.storage_failure.clone()
            }
        };

        connection.send_message(chat_id, &reply).await
    }

    /// Private chats and "everyone is admin" groups skip the platform lookup
    async fn is_sender_admin(&self, message: &ChatMessage, connection: &dyn ChatConnection) -> bool {
        if message.is_private || message.all_members_are_admins {
            return true;
        }

        match connection.is_user_admin(message.chat_id, message.user_id).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                warn!(
                    "Admin lookup failed for user {} in chat {}: {}",
                    message.user_id, message.chat_id, e
                );
                false
            }
        }
    }

    async fn handle_add_words(&self, message: &ChatMessage, argument: &str) -> LedgerResult<String> {
        let words = split_word_list(argument, MIN_WORD_CHARS);
        self.ledger.add_prohibited_words(message.chat_id, &words)?;
        self.word_cache.invalidate(message.chat_id).await;
        Ok(self.responses.success.clone())
    }

    async fn handle_remove_words(&self, message: &ChatMessage, argument: &str) -> LedgerResult<String> {
        let words = split_word_list(argument, 1);
        self.ledger.remove_prohibited_words(message.chat_id, &words)?;
        self.word_cache.invalidate(message.chat_id).await;
        Ok(self.responses.success.clone())
    }

    fn handle_list_words(&self, message: &ChatMessage) -> LedgerResult<String> {
        let words = self.ledger.list_prohibited_words(message.chat_id)?;
        let quoted: Vec<String> = words.iter().map(|word| format!("'{}'", word)).collect();
        Ok(format!("{}\n{}", self.responses.words_list_header, quoted.join(" ")))
    }

    fn handle_scores(&self, message: &ChatMessage) -> LedgerResult<String> {
        let mut reply = self.responses.users_list_header.clone();
        for user in self.ledger.list_users(message.chat_id)? {
            reply.push_str(&format!("\n{} - {}", user.name, user.score));
        }
        Ok(reply)
    }

    fn handle_amnesty(&self, message: &ChatMessage, argument: &str) -> LedgerResult<String> {
        let count = match argument.parse::<u32>() {
            Ok(count) if count > 0 => count,
            _ => return Ok(self.responses.wrong_count.clone()),
        };

        let outcome = self.ledger.revoke_recent(message.chat_id, count)?;
        let Some(user_id) = outcome.user_id.filter(|_| !outcome.is_empty()) else {
            return Ok(self.responses.nothing_amnestied.clone());
        };

        let name = self.ledger.get_user_name(message.chat_id, user_id)?;
        Ok(self.responses.amnesty_report(&name, &outcome.words))
    }
}
