use log::info;
use rusqlite::Connection;

use crate::types::LedgerResult;

pub const LATEST_VERSION: i64 = 1;

/// Ordered schema migrations. Each entry is applied once, in its own transaction.
const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "
    CREATE TABLE users (
        chat_id     INTEGER NOT NULL,
        user_id     INTEGER NOT NULL,
        name        TEXT NOT NULL,
        score       INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (chat_id, user_id)
    );

    CREATE TABLE prohibited_words (
        id          INTEGER PRIMARY KEY,
        chat_id     INTEGER NOT NULL,
        word        TEXT NOT NULL,
        state       TEXT NOT NULL DEFAULT 'active' CHECK (state IN ('active', 'removed')),
        UNIQUE (chat_id, word)
    );

    CREATE TABLE usage_events (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id     INTEGER NOT NULL,
        user_id     INTEGER NOT NULL,
        word_id     INTEGER NOT NULL REFERENCES prohibited_words(id),
        revoked     INTEGER NOT NULL DEFAULT 0,
        created_at  TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_usage_events_chat
        ON usage_events(chat_id, id);
    ",
)];

pub fn run(conn: &mut Connection) -> LedgerResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let current = current_version(conn)?;

    for (version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
        info!("Ledger: running migration v{}", version);
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
    }

    if current < LATEST_VERSION {
        info!("Ledger schema updated from v{} to v{}", current, LATEST_VERSION);
    }
    Ok(())
}

pub fn current_version(conn: &Connection) -> LedgerResult<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}
