//! Database module - SQLite storage for votes and their targets.
//!
//! This module provides connection management with WAL
//! PRAGMAs, the SQL helper functions vote queries rely on, and the
//! operations that record votes and execute [`VoteQuery`] descriptors.
//!
//! [`VoteQuery`]: crate::search::VoteQuery

mod functions;
mod ops;
mod schema;
mod users;

pub use ops::*;
pub use users::SqliteUserLookup;

use rusqlite::Connection;
use std::path::Path;

use crate::{Result, VoteSearchError};

/// Database wrapper providing connection management.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference to the underlying connection.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// Open a database connection with WAL mode and optimized PRAGMAs.
///
/// This function:
/// 1. Creates parent directory if it doesn't exist
/// 2. Opens connection with rusqlite
/// 3. Configures WAL mode and busy timeout
/// 4. Registers the IP address SQL functions
/// 5. Initializes schema (creates tables if needed)
pub fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path).map_err(|e| VoteSearchError::Database(e.to_string()))?;

    // Configure WAL mode - persists to the database file
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| VoteSearchError::Database(format!("Failed to set journal_mode: {}", e)))?;

    // NORMAL synchronous is safe in WAL mode, faster than FULL
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(|e| VoteSearchError::Database(format!("Failed to set synchronous: {}", e)))?;

    // Group-by subqueries for duplicate detection build temp b-trees
    conn.pragma_update(None, "temp_store", "MEMORY")
        .map_err(|e| VoteSearchError::Database(format!("Failed to set temp_store: {}", e)))?;

    // 5 second busy timeout for concurrent access
    conn.pragma_update(None, "busy_timeout", 5000i32)
        .map_err(|e| VoteSearchError::Database(format!("Failed to set busy_timeout: {}", e)))?;

    prepare(&conn)?;
    tracing::info!("Database opened: {:?}", path);

    Ok(Database { conn })
}

/// Open a private in-memory database with the schema installed.
pub fn open_in_memory() -> Result<Database> {
    let conn = Connection::open_in_memory().map_err(|e| VoteSearchError::Database(e.to_string()))?;
    prepare(&conn)?;
    Ok(Database { conn })
}

fn prepare(conn: &Connection) -> Result<()> {
    functions::register(conn)?;
    schema::init(conn)
}
