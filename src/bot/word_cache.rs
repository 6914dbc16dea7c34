use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::UsageLedger;
use crate::types::{ChatId, LedgerResult};

/// Per-chat memo of the active prohibited words.
///
/// Entries are loaded on first use and live until invalidated. The ledger stays the
/// source of truth; a disabled cache reloads on every read. Every invalidation bumps the
/// chat's generation, and a load only lands if the generation it started from is still
/// current, so a list read before an invalidation is never stored after it.
pub struct WordCache {
    state: RwLock<CacheState>,
    enabled: bool,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<ChatId, Arc<[String]>>,
    generations: HashMap<ChatId, u64>,
}

impl CacheState {
    fn generation(&self, chat_id: ChatId) -> u64 {
        self.generations.get(&chat_id).copied().unwrap_or(0)
    }
}

impl WordCache {
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            enabled,
        }
    }

    /// Active words for `chat_id`, loading them from the ledger on a miss
    pub async fn get(&self, chat_id: ChatId, ledger: &UsageLedger) -> LedgerResult<Arc<[String]>> {
        let generation = {
            let state = self.state.read().await;
            if self.enabled {
                if let Some(words) = state.entries.get(&chat_id) {
                    return Ok(Arc::clone(words));
                }
            }
            state.generation(chat_id)
        };

        let words: Arc<[String]> = ledger.list_prohibited_words(chat_id)?.into();
        debug!("Loaded {} prohibited word(s) for chat {}", words.len(), chat_id);

        if self.enabled {
            self.store(chat_id, generation, Arc::clone(&words)).await;
        }
        Ok(words)
    }

    async fn store(&self, chat_id: ChatId, generation: u64, words: Arc<[String]>) {
        let mut state = self.state.write().await;
        if state.generation(chat_id) == generation {
            state.entries.insert(chat_id, words);
        } else {
            debug!("Discarding word list for chat {} loaded before invalidation", chat_id);
        }
    }

    pub async fn invalidate(&self, chat_id: ChatId) {
        let mut state = self.state.write().await;
        *state.generations.entry(chat_id).or_insert(0) += 1;
        if state.entries.remove(&chat_id).is_some() {
            debug!("Invalidated word cache for chat {}", chat_id);
        }
    }

    pub async fn cached_chats(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

impl Default for WordCache {
    fn default() -> Self {
        Self::new()
    }
}
