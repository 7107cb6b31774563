//! Database Connection and Setup
//!
//! Manages the SQLite connection and migrations.

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{timestamp, DomainError, DomainResult, Timestamp};

/// Database state wrapper
pub struct DbState {
    conn: Arc<Mutex<Connection>>,
}

impl DbState {
    /// Shared handle for repositories
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }
}

/// Initialize database with path; `:memory:` opens a private in-memory database
pub async fn init_db(db_path: &Path) -> DomainResult<DbState> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(db_path)
        .map_err(|e| DomainError::Database(format!("Failed to open {}: {}", db_path.display(), e)))?;

    run_migrations(&conn)?;

    Ok(DbState {
        conn: Arc::new(Mutex::new(conn)),
    })
}

/// Read an ISO-8601 timestamp column
pub(super) fn read_timestamp(raw: &str) -> DomainResult<Timestamp> {
    timestamp::parse(raw).map_err(|e| DomainError::Database(format!("Bad timestamp {:?}: {}", raw, e)))
}

/// Read an optional JSON column
pub(super) fn read_json<T: DeserializeOwned>(raw: Option<String>) -> DomainResult<Option<T>> {
    match raw {
        Some(text) if !text.is_empty() => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| DomainError::Database(format!("Bad JSON column: {}", e))),
        _ => Ok(None),
    }
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    let query = format!("PRAGMA table_info({})", table);
    let Ok(mut stmt) = conn.prepare(&query) else {
        return false;
    };
    let Ok(names) = stmt.query_map([], |row| row.get::<_, String>(1)) else {
        return false;
    };
    let found = names.flatten().any(|name| name == column);
    found
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> DomainResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS form_templates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            fields TEXT NOT NULL DEFAULT '[]',
            settings TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS form_responses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            form_template_id INTEGER NOT NULL,
            data TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'draft',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            submitted_at TEXT,
            offline_created INTEGER NOT NULL DEFAULT 0,
            synced_at TEXT
        )",
        [],
    )?;

    // Snapshot columns arrived after the first release
    if !column_exists(conn, "form_responses", "device_info") {
        conn.execute("ALTER TABLE form_responses ADD COLUMN device_info TEXT", [])
            .map_err(|e| DomainError::Database(format!("Failed to add device_info: {}", e)))?;
    }

    if !column_exists(conn, "form_responses", "location_data") {
        conn.execute("ALTER TABLE form_responses ADD COLUMN location_data TEXT", [])
            .map_err(|e| DomainError::Database(format!("Failed to add location_data: {}", e)))?;
    }

    if !column_exists(conn, "form_responses", "meta") {
        conn.execute("ALTER TABLE form_responses ADD COLUMN meta TEXT", [])
            .map_err(|e| DomainError::Database(format!("Failed to add meta: {}", e)))?;
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_responses_template ON form_responses(form_template_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_responses_sync ON form_responses(offline_created, status)",
        [],
    )?;

    Ok(())
}
