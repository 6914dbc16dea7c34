// src/storage/ledger.rs - Word list, usage log and score operations

use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use crate::storage::UsageLedger;
use crate::types::{
    ChatId, LedgerError, LedgerResult, RevokeOutcome, UsageEvent, UserId, UserScore, WordChange,
    WordState,
};

impl UsageLedger {
    // -- Prohibited words --

    /// Insert a word or reactivate it if it was removed earlier
    pub fn add_prohibited_word(&self, chat_id: ChatId, word: &str) -> LedgerResult<WordChange> {
        self.with_transaction(|tx| apply_add(tx, chat_id, word))
    }

    /// Add several words as one unit; either all of them land or none do
    pub fn add_prohibited_words<S: AsRef<str>>(
        &self,
        chat_id: ChatId,
        words: &[S],
    ) -> LedgerResult<Vec<WordChange>> {
        self.with_transaction(|tx| {
            words
                .iter()
                .map(|word| apply_add(tx, chat_id, word.as_ref()))
                .collect()
        })
    }

    /// Soft-remove a word. Returns false when there was no active word to remove.
    pub fn remove_prohibited_word(&self, chat_id: ChatId, word: &str) -> LedgerResult<bool> {
        self.with_transaction(|tx| apply_remove(tx, chat_id, word))
    }

    pub fn remove_prohibited_words<S: AsRef<str>>(
        &self,
        chat_id: ChatId,
        words: &[S],
    ) -> LedgerResult<Vec<bool>> {
        self.with_transaction(|tx| {
            words
                .iter()
                .map(|word| apply_remove(tx, chat_id, word.as_ref()))
                .collect()
        })
    }

    /// Active words of a chat in lexicographic order
    pub fn list_prohibited_words(&self, chat_id: ChatId) -> LedgerResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT word FROM prohibited_words WHERE chat_id = ?1 AND state = ?2 ORDER BY word ASC",
            )?;
            let words = stmt
                .query_map(params![chat_id, WordState::Active.as_str()], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(words)
        })
    }

    // -- Users --

    /// Create the user with a zero score, or refresh the stored display name
    pub fn upsert_user(&self, chat_id: ChatId, user_id: UserId, name: &str) -> LedgerResult<()> {
        self.with_conn(|conn| apply_upsert(conn, chat_id, user_id, name))
    }

    pub fn get_user_score(&self, chat_id: ChatId, user_id: UserId) -> LedgerResult<i64> {
        self.with_conn(|conn| query_score(conn, chat_id, user_id))
    }

    pub fn get_user_name(&self, chat_id: ChatId, user_id: UserId) -> LedgerResult<String> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT name FROM users WHERE chat_id = ?1 AND user_id = ?2",
                params![chat_id, user_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| user_not_found(chat_id, user_id))
        })
    }

    /// Users of a chat by score, highest first. Equal scores keep insertion order.
    pub fn list_users(&self, chat_id: ChatId) -> LedgerResult<Vec<UserScore>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, name, score FROM users WHERE chat_id = ?1
                 ORDER BY score DESC, rowid ASC",
            )?;
            let users = stmt
                .query_map([chat_id], |row| {
                    Ok(UserScore {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        score: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    // -- Usage events --

    /// Append one usage event per matched word and raise the user's score by the same
    /// amount. Returns the updated score.
    ///
    /// The user must have been upserted and every word must be active in the chat;
    /// otherwise nothing is written.
    pub fn record_usage<S: AsRef<str>>(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        words: &[S],
    ) -> LedgerResult<i64> {
        self.with_transaction(|tx| apply_record(tx, chat_id, user_id, words))
    }

    /// Upsert the user and record their usages as one unit. A failure leaves neither the
    /// user row nor any event behind.
    pub fn record_fine<S: AsRef<str>>(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        name: &str,
        words: &[S],
    ) -> LedgerResult<i64> {
        self.with_transaction(|tx| {
            apply_upsert(tx, chat_id, user_id, name)?;
            apply_record(tx, chat_id, user_id, words)
        })
    }

    /// Revoke up to `count` of the most recent usage events of a chat.
    ///
    /// The scan walks the log from the newest event down and ends at the first event owned
    /// by someone other than the most recent contributor. Already revoked events are skipped
    /// and do not count towards `count`.
    pub fn revoke_recent(&self, chat_id: ChatId, count: u32) -> LedgerResult<RevokeOutcome> {
        if count == 0 {
            return Ok(RevokeOutcome::default());
        }

        self.with_transaction(|tx| {
            let mut owner: Option<UserId> = None;
            let mut event_ids: Vec<i64> = Vec::new();
            let mut words: Vec<String> = Vec::new();

            {
                let mut stmt = tx.prepare(
                    "SELECT e.id, e.user_id, e.revoked, w.word
                     FROM usage_events e
                     JOIN prohibited_words w ON w.id = e.word_id
                     WHERE e.chat_id = ?1
                     ORDER BY e.id DESC",
                )?;
                let mut rows = stmt.query([chat_id])?;

                while let Some(row) = rows.next()? {
                    let user_id: UserId = row.get(1)?;
                    if owner.is_some_and(|owner| owner != user_id) {
                        break;
                    }
                    owner = Some(user_id);

                    let revoked: bool = row.get(2)?;
                    if revoked {
                        continue;
                    }

                    event_ids.push(row.get(0)?);
                    words.push(row.get(3)?);
                    if event_ids.len() >= count as usize {
                        break;
                    }
                }
            }

            let user_id = match owner {
                Some(user_id) if !event_ids.is_empty() => user_id,
                _ => return Ok(RevokeOutcome::default()),
            };

            let mut mark = tx.prepare("UPDATE usage_events SET revoked = 1 WHERE id = ?1")?;
            for id in &event_ids {
                mark.execute([id])?;
            }

            tx.execute(
                "UPDATE users SET score = score - ?1 WHERE chat_id = ?2 AND user_id = ?3",
                params![event_ids.len() as i64, chat_id, user_id],
            )?;

            info!(
                "Revoked {} usage(s) of user {} in chat {}",
                event_ids.len(),
                user_id,
                chat_id
            );
            Ok(RevokeOutcome {
                user_id: Some(user_id),
                words,
            })
        })
    }

    /// Full usage log of a chat in log order
    pub fn usage_events(&self, chat_id: ChatId) -> LedgerResult<Vec<UsageEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT e.id, e.chat_id, e.user_id, w.word, e.revoked, e.created_at
                 FROM usage_events e
                 JOIN prohibited_words w ON w.id = e.word_id
                 WHERE e.chat_id = ?1
                 ORDER BY e.id ASC",
            )?;
            let events = stmt
                .query_map([chat_id], |row| {
                    Ok(UsageEvent {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        user_id: row.get(2)?,
                        word: row.get(3)?,
                        revoked: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(events)
        })
    }
}

fn apply_add(conn: &Connection, chat_id: ChatId, word: &str) -> LedgerResult<WordChange> {
    let state = query_word_state(conn, chat_id, word)?;

    let change = match state {
        None => {
            conn.execute(
                "INSERT INTO prohibited_words (chat_id, word, state) VALUES (?1, ?2, ?3)",
                params![chat_id, word, WordState::Active.as_str()],
            )?;
            WordChange::Added
        }
        Some(WordState::Removed) => {
            set_word_state(conn, chat_id, word, WordState::Active)?;
            WordChange::Reactivated
        }
        Some(WordState::Active) => WordChange::AlreadyActive,
    };

    if change != WordChange::AlreadyActive {
        info!("Prohibited word '{}' {:?} in chat {}", word, change, chat_id);
    }
    Ok(change)
}

fn apply_remove(conn: &Connection, chat_id: ChatId, word: &str) -> LedgerResult<bool> {
    if query_word_state(conn, chat_id, word)? != Some(WordState::Active) {
        return Ok(false);
    }

    set_word_state(conn, chat_id, word, WordState::Removed)?;
    info!("Prohibited word '{}' removed in chat {}", word, chat_id);
    Ok(true)
}

fn query_word_state(conn: &Connection, chat_id: ChatId, word: &str) -> LedgerResult<Option<WordState>> {
    let state: Option<String> = conn
        .query_row(
            "SELECT state FROM prohibited_words WHERE chat_id = ?1 AND word = ?2",
            params![chat_id, word],
            |row| row.get(0),
        )
        .optional()?;

    state.map(|state| state.parse()).transpose()
}

fn set_word_state(conn: &Connection, chat_id: ChatId, word: &str, state: WordState) -> LedgerResult<()> {
    conn.execute(
        "UPDATE prohibited_words SET state = ?1 WHERE chat_id = ?2 AND word = ?3",
        params![state.as_str(), chat_id, word],
    )?;
    Ok(())
}

fn apply_upsert(conn: &Connection, chat_id: ChatId, user_id: UserId, name: &str) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO users (chat_id, user_id, name, score) VALUES (?1, ?2, ?3, 0)
         ON CONFLICT (chat_id, user_id) DO UPDATE SET name = excluded.name",
        params![chat_id, user_id, name],
    )?;
    Ok(())
}

fn apply_record<S: AsRef<str>>(
    conn: &Connection,
    chat_id: ChatId,
    user_id: UserId,
    words: &[S],
) -> LedgerResult<i64> {
    let score = query_score(conn, chat_id, user_id)?;
    if words.is_empty() {
        return Ok(score);
    }

    let mut lookup = conn.prepare(
        "SELECT id FROM prohibited_words WHERE chat_id = ?1 AND word = ?2 AND state = ?3",
    )?;
    let mut insert =
        conn.prepare("INSERT INTO usage_events (chat_id, user_id, word_id) VALUES (?1, ?2, ?3)")?;

    for word in words {
        let word = word.as_ref();
        let word_id: i64 = lookup
            .query_row(params![chat_id, word, WordState::Active.as_str()], |row| row.get(0))
            .optional()?
            .ok_or_else(|| {
                LedgerError::InvalidArgument(format!(
                    "'{}' is not an active prohibited word in chat {}",
                    word, chat_id
                ))
            })?;
        insert.execute(params![chat_id, user_id, word_id])?;
    }

    let delta = words.len() as i64;
    conn.execute(
        "UPDATE users SET score = score + ?1 WHERE chat_id = ?2 AND user_id = ?3",
        params![delta, chat_id, user_id],
    )?;

    debug!("Recorded {} usage(s) for user {} in chat {}", delta, user_id, chat_id);
    Ok(score + delta)
}

fn query_score(conn: &Connection, chat_id: ChatId, user_id: UserId) -> LedgerResult<i64> {
    conn.query_row(
        "SELECT score FROM users WHERE chat_id = ?1 AND user_id = ?2",
        params![chat_id, user_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| user_not_found(chat_id, user_id))
}

fn user_not_found(chat_id: ChatId, user_id: UserId) -> LedgerError {
    LedgerError::NotFound(format!("user {} in chat {}", user_id, chat_id))
}
