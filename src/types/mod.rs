// src/types/mod.rs - Core message and ledger types shared across the bot

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Opaque chat identifier as handed out by the chat platform
pub type ChatId = i64;

/// Platform user identifier, unique per platform but not per chat
pub type UserId = i64;

/// Core message type that flows from a platform connection into the bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub platform: String,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// One-on-one conversation between the bot and the sender
    pub is_private: bool,
    /// Group flag that makes every member an administrator
    pub all_members_are_admins: bool,
    pub is_forwarded: bool,
}

impl ChatMessage {
    /// Name shown in score listings: username, then first name, then "unknown"
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .or_else(|| self.first_name.as_deref().filter(|name| !name.is_empty()))
            .unwrap_or("unknown")
    }
}

/// Lifecycle of a prohibited word. Removal is soft so usage events keep their reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordState {
    Active,
    Removed,
}

impl WordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WordState::Active => "active",
            WordState::Removed => "removed",
        }
    }
}

impl fmt::Display for WordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WordState {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(WordState::Active),
            "removed" => Ok(WordState::Removed),
            other => Err(LedgerError::InvalidArgument(format!("unknown word state '{}'", other))),
        }
    }
}

/// What `add_prohibited_word` did to the word list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordChange {
    Added,
    Reactivated,
    AlreadyActive,
}

/// Row of the per-chat score table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScore {
    pub user_id: UserId,
    pub name: String,
    pub score: i64,
}

/// One recorded occurrence of a prohibited word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: i64,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub word: String,
    pub revoked: bool,
    pub created_at: String,
}

/// Result of an amnesty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevokeOutcome {
    /// Owner of the revoked events; `None` when nothing was revoked
    pub user_id: Option<UserId>,
    /// Revoked words in stored casing, most recent first
    pub words: Vec<String>,
}

impl RevokeOutcome {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Errors surfaced by the usage ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("ledger connection lock poisoned")]
    LockPoisoned,
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
