// src/storage/mod.rs - Embedded SQLite store backing the usage ledger

pub mod ledger;
pub mod migrations;

use log::info;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;

use crate::types::{LedgerError, LedgerResult};

/// Durable store of prohibited words, usage events and user scores.
///
/// A single connection sits behind a mutex, so every operation owns the store for its
/// whole duration and multi-statement mutations run as one transaction.
pub struct UsageLedger {
    conn: Mutex<Connection>,
}

impl UsageLedger {
    /// Open (or create) the ledger database at `path` and bring its schema up to date
    pub fn open(path: &Path) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let ledger = Self::from_connection(conn)?;

        info!("Usage ledger opened at {}", path.display());
        Ok(ledger)
    }

    /// Open a private in-memory ledger
    pub fn open_in_memory() -> LedgerResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> LedgerResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&Connection) -> LedgerResult<T>,
    {
        let conn = self.conn.lock().map_err(|_| LedgerError::LockPoisoned)?;
        f(&conn)
    }

    /// Run `f` inside an immediate transaction. Any error rolls the transaction back.
    pub fn with_transaction<F, T>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> LedgerResult<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| LedgerError::LockPoisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Latest applied schema migration
    pub fn schema_version(&self) -> LedgerResult<i64> {
        self.with_conn(migrations::current_version)
    }
}
