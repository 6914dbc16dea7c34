// src/bot/message_processor.rs - Fines prohibited words in ordinary chat messages

use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::bot::word_cache::WordCache;
use crate::bot::word_matching::find_words;
use crate::config::ResponseTemplates;
use crate::platforms::ChatConnection;
use crate::storage::UsageLedger;
use crate::types::{ChatMessage, LedgerError, LedgerResult};

pub struct MessageProcessor {
    ledger: Arc<UsageLedger>,
    word_cache: Arc<WordCache>,
    responses: ResponseTemplates,
}

impl MessageProcessor {
    pub fn new(ledger: Arc<UsageLedger>, word_cache: Arc<WordCache>, responses: ResponseTemplates) -> Self {
        Self {
            ledger,
            word_cache,
            responses,
        }
    }

    /// Score a plain message. Returns the number of fined words.
    ///
    /// Ledger failures are reported to the chat with the storage failure reply and leave
    /// the ledger untouched.
    pub async fn process_message(
        &self,
        message: &ChatMessage,
        connection: &dyn ChatConnection,
    ) -> Result<usize> {
        if message.is_forwarded {
            debug!("Ignoring forwarded message in chat {}", message.chat_id);
            return Ok(0);
        }

        let chat_id = message.chat_id;
        let (fined, score) = match self.fine(message).await {
            Ok(Some(fine)) => fine,
            Ok(None) => return Ok(0),
            Err(e) => {
                error!(
                    "Failed to fine user {} in chat {}: {}",
                    message.user_id, chat_id, e
                );
                connection
                    .send_message(chat_id, &self.responses.storage_failure)
                    .await?;
                return Ok(0);
            }
        };

        info!(
            "User {} fined {} time(s) in chat {}, score now {}",
            message.user_id,
            fined.len(),
            chat_id,
            score
        );

        let reply = format!(
            "{}: {} ({})\n{}: {}",
            self.responses.fine,
            fined.len(),
            fined.join(", "),
            self.responses.total_score,
            score
        );
        connection.send_message(chat_id, &reply).await?;

        Ok(fined.len())
    }

    /// Record the matched words of `message`. Returns `None` when nothing matched.
    async fn fine(&self, message: &ChatMessage) -> LedgerResult<Option<(Vec<String>, i64)>> {
        let chat_id = message.chat_id;
        let mut fined = self.match_words(message).await?;
        if fined.is_empty() {
            return Ok(None);
        }

        let score = match self.record(message, &fined) {
            Err(LedgerError::InvalidArgument(reason)) => {
                // The word list changed under a cached entry; rematch against the live list
                warn!("Stale word cache for chat {}: {}", chat_id, reason);
                self.word_cache.invalidate(chat_id).await;
                fined = self.match_words(message).await?;
                if fined.is_empty() {
                    return Ok(None);
                }
                self.record(message, &fined)?
            }
            other => other?,
        };

        Ok(Some((fined, score)))
    }

    fn record(&self, message: &ChatMessage, words: &[String]) -> LedgerResult<i64> {
        self.ledger
            .record_fine(message.chat_id, message.user_id, message.display_name(), words)
    }

    async fn match_words(&self, message: &ChatMessage) -> LedgerResult<Vec<String>> {
        let words = self.word_cache.get(message.chat_id, &self.ledger).await?;
        Ok(find_words(&message.content, &words))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::test_support::{group_message, RecordingConnection};

    const CHAT: i64 = 123;

    fn processor() -> (MessageProcessor, Arc<UsageLedger>, Arc<WordCache>) {
        let ledger = Arc::new(UsageLedger::open_in_memory().unwrap());
        let cache = Arc::new(WordCache::new());
        let processor = MessageProcessor::new(
            Arc::clone(&ledger),
            Arc::clone(&cache),
            ResponseTemplates::default(),
        );
        (processor, ledger, cache)
    }

    #[tokio::test]
    async fn test_matches_are_fined_and_reported() {
        let (processor, ledger, _) = processor();
        let connection = RecordingConnection::with_admins(Vec::new());
        ledger.add_prohibited_word(CHAT, "spam").unwrap();

        let message = group_message(CHAT, 1, "alice", "this is spam spam");
        assert_eq!(processor.process_message(&message, &connection).await.unwrap(), 2);

        assert_eq!(ledger.get_user_score(CHAT, 1).unwrap(), 2);
        assert_eq!(ledger.get_user_name(CHAT, 1).unwrap(), "alice");
        assert_eq!(
            connection.last_message().await.unwrap(),
            "Fined: 2 (spam, spam)\nTotal score: 2"
        );
    }

    #[tokio::test]
    async fn test_clean_messages_stay_silent() {
        let (processor, ledger, _) = processor();
        let connection = RecordingConnection::with_admins(Vec::new());
        ledger.add_prohibited_word(CHAT, "spam").unwrap();

        let message = group_message(CHAT, 1, "alice", "spammy but fine");
        assert_eq!(processor.process_message(&message, &connection).await.unwrap(), 0);

        assert!(connection.sent().await.is_empty());
        assert!(ledger.list_users(CHAT).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forwarded_messages_are_ignored() {
        let (processor, ledger, _) = processor();
        let connection = RecordingConnection::with_admins(Vec::new());
        ledger.add_prohibited_word(CHAT, "spam").unwrap();

        let mut message = group_message(CHAT, 1, "alice", "spam");
        message.is_forwarded = true;
        assert_eq!(processor.process_message(&message, &connection).await.unwrap(), 0);
        assert!(connection.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_cache_entry_is_refreshed() {
        let (processor, ledger, cache) = processor();
        let connection = RecordingConnection::with_admins(Vec::new());
        ledger.add_prohibited_words(CHAT, &["spam", "ham"]).unwrap();
        cache.get(CHAT, &ledger).await.unwrap();

        // Removed without invalidating the cache
        ledger.remove_prohibited_word(CHAT, "ham").unwrap();

        let message = group_message(CHAT, 1, "alice", "ham and spam");
        assert_eq!(processor.process_message(&message, &connection).await.unwrap(), 1);
        assert_eq!(ledger.get_user_score(CHAT, 1).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported_and_leaves_no_user() {
        let (processor, ledger, _) = processor();
        let connection = RecordingConnection::with_admins(Vec::new());
        ledger.add_prohibited_word(CHAT, "spam").unwrap();
        ledger
            .with_conn(|conn| Ok(conn.execute_batch("DROP TABLE usage_events")?))
            .unwrap();

        let message = group_message(CHAT, 1, "alice", "spam");
        assert_eq!(processor.process_message(&message, &connection).await.unwrap(), 0);

        assert_eq!(
            connection.sent().await,
            vec![(CHAT, ResponseTemplates::default().storage_failure)]
        );
        assert!(ledger.list_users(CHAT).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_display_name_follows_latest_message() {
        let (processor, ledger, _) = processor();
        let connection = RecordingConnection::with_admins(Vec::new());
        ledger.add_prohibited_word(CHAT, "spam").unwrap();

        processor
            .process_message(&group_message(CHAT, 1, "old", "spam"), &connection)
            .await
            .unwrap();
        processor
            .process_message(&group_message(CHAT, 1, "new", "spam"), &connection)
            .await
            .unwrap();

        assert_eq!(ledger.get_user_name(CHAT, 1).unwrap(), "new");
        assert_eq!(ledger.get_user_score(CHAT, 1).unwrap(), 2);
    }
}
