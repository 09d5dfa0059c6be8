// src/db.rs
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

/// The two unique indexes on poll_responses are the real dedup guarantee;
/// the application-level duplicate check in votes.rs is a fast path over them.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS poll_definitions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        poll_id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS poll_options (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        poll_definition_id INTEGER NOT NULL REFERENCES poll_definitions(id) ON DELETE CASCADE,
        option_id TEXT NOT NULL,
        text TEXT NOT NULL,
        display_order INTEGER NOT NULL,
        UNIQUE(poll_definition_id, option_id)
    )",
    "CREATE TABLE IF NOT EXISTS poll_responses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        poll_definition_id INTEGER NOT NULL REFERENCES poll_definitions(id) ON DELETE CASCADE,
        client_token TEXT NOT NULL,
        ip_hash TEXT NOT NULL,
        unique_id TEXT NOT NULL,
        contact_unique_id TEXT,
        metadata TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_responses_poll_token
        ON poll_responses(poll_definition_id, client_token)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_responses_poll_ip
        ON poll_responses(poll_definition_id, ip_hash)",
    "CREATE TABLE IF NOT EXISTS poll_response_options (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        poll_response_id INTEGER NOT NULL REFERENCES poll_responses(id) ON DELETE CASCADE,
        poll_option_id INTEGER NOT NULL REFERENCES poll_options(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS contacts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        unique_id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        company TEXT,
        phone TEXT,
        notes TEXT,
        ip_hash TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'new',
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_contacts_ip ON contacts(ip_hash)",
    "CREATE TABLE IF NOT EXISTS contact_tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS contact_tag_mapping (
        contact_id INTEGER NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES contact_tags(id) ON DELETE CASCADE,
        PRIMARY KEY (contact_id, tag_id)
    )",
    "CREATE TABLE IF NOT EXISTS contact_interactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        contact_id INTEGER NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
        kind TEXT NOT NULL,
        note TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
];

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// True when the storage layer rejected a write on a UNIQUE constraint.
/// Both the vote path and the poll-creation path treat this as "somebody
/// else got there first", not as a failure.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// In-memory database for tests. A single connection keeps the database
/// alive for the pool's lifetime and serializes concurrent test traffic.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    run_migrations(&pool).await.unwrap();
    pool
}
