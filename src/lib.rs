//! # Swear Jar Moderation Bot
//!
//! A chat moderation bot that fines prohibited words. Every match is written to a durable,
//! revocable usage ledger and each user's score always equals their unrevoked usages.
//!
//! ## Features
//!
//! - **Per-chat word lists**: admins add and remove prohibited words; removal is soft
//! - **Whole-word matching**: case-insensitive, punctuation-insensitive, one fine per occurrence
//! - **Amnesty**: revoke the most recent fines of the latest offender, newest first
//! - **Transactional ledger**: SQLite-backed, every score change commits with its events
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use swearjar::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BotConfiguration::default();
//!     let ledger = Arc::new(UsageLedger::open(&config.database_path)?);
//!
//!     let mut bot = ChatBot::new(ledger, &config);
//!     bot.add_connection(Box::new(ConsoleConnection::new(config.admin_user_ids.clone()))).await;
//!
//!     for handle in bot.start().await? {
//!         handle.await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod platforms;
pub mod storage;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bot::ChatBot;
    pub use crate::config::{BotConfiguration, ResponseTemplates};
    pub use crate::platforms::{console::ConsoleConnection, ChatConnection};
    pub use crate::storage::UsageLedger;
    pub use crate::types::{
        ChatId, ChatMessage, LedgerError, LedgerResult, RevokeOutcome, UsageEvent, UserId,
        UserScore, WordChange, WordState,
    };
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
