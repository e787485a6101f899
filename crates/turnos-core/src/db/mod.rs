//! Database layer for turnos.

mod schema;
mod documents;
mod accounts;

pub use schema::*;
pub use documents::*;
pub use accounts::*;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),

    #[error("Blocking task failed: {0}")]
    Task(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Connection shared between the async adapters.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Run `f` against a shared connection on tokio's blocking pool.
pub async fn with_blocking<T, F>(db: &SharedDatabase, f: F) -> DbResult<T>
where
    F: FnOnce(&Database) -> DbResult<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || {
        let guard = db.lock().map_err(|e| DbError::Poisoned(e.to_string()))?;
        f(&*guard)
    })
    .await
    .map_err(|e| DbError::Task(e.to_string()))?
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Wrap into a handle shareable across async adapters.
    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }
}
