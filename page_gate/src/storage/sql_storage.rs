// SQLite token store for Page Gate
//
// Tokens live in one table, their access history in another. The audit update
// runs as a single IMMEDIATE transaction so concurrent appends for one token
// are serialized by SQLite's write lock as well as by the connection mutex.

use crate::error::{PageGateError, Result};
use crate::types::{AccessLogEntry, AllowedPages, StoreStats, Token};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tokens (
    id                TEXT PRIMARY KEY,
    value             TEXT NOT NULL UNIQUE,
    is_active         INTEGER NOT NULL,
    expires_at        TEXT NOT NULL,
    allowed_pages     TEXT NOT NULL,
    access_count      INTEGER NOT NULL DEFAULT 0,
    last_accessed_at  TEXT,
    created_at        TEXT NOT NULL,
    label             TEXT
);

CREATE TABLE IF NOT EXISTS access_log (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    token_id    TEXT NOT NULL REFERENCES tokens(id) ON DELETE CASCADE,
    timestamp   TEXT NOT NULL,
    page        TEXT NOT NULL,
    ip          TEXT,
    user_agent  TEXT
);

CREATE INDEX IF NOT EXISTS idx_access_log_token ON access_log(token_id, seq);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed token store
#[derive(Clone)]
pub struct SqlStorage {
    conn: Arc<Mutex<Connection>>,
}

/// Token row as stored, before timestamp and JSON decoding
struct TokenRow {
    id: String,
    value: String,
    is_active: bool,
    expires_at: String,
    allowed_pages: String,
    access_count: i64,
    last_accessed_at: Option<String>,
    created_at: String,
    label: Option<String>,
}

impl SqlStorage {
    /// Open a file-backed store, creating the parent directory if needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        if let Err(e) = conn.execute_batch("PRAGMA journal_mode = WAL;") {
            warn!("Could not enable WAL journal at {}: {}", path.display(), e);
        }
        Self::init_connection(&conn)?;

        info!("Opened SQLite token store at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store
    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut *guard)
        })
        .await?
    }

    /// Like `with_conn`, but gives up with `Timeout` if the connection is not
    /// free by `deadline`
    async fn with_conn_until<T, F>(&self, deadline: Instant, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .try_lock_until(deadline)
                .ok_or(PageGateError::Timeout)?;
            f(&mut *guard)
        })
        .await?
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| PageGateError::Database(format!("Malformed {} '{}': {}", field, raw, e)))
}

fn load_access_log(conn: &Connection, token_id: &str) -> Result<Vec<AccessLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, page, ip, user_agent FROM access_log
         WHERE token_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map([token_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (timestamp, page, ip, user_agent) = row?;
        entries.push(AccessLogEntry {
            timestamp: parse_time("access timestamp", &timestamp)?,
            page,
            ip,
            user_agent,
        });
    }
    Ok(entries)
}

fn decode_token(row: TokenRow, access_log: Vec<AccessLogEntry>) -> Result<Token> {
    let allowed_pages: AllowedPages = serde_json::from_str(&row.allowed_pages).map_err(|e| {
        PageGateError::Database(format!("Malformed allowed_pages for {}: {}", row.id, e))
    })?;
    let access_count = u64::try_from(row.access_count).map_err(|_| {
        PageGateError::Database(format!("Negative access_count for {}", row.id))
    })?;

    Ok(Token {
        expires_at: parse_time("expires_at", &row.expires_at)?,
        last_accessed_at: row
            .last_accessed_at
            .as_deref()
            .map(|raw| parse_time("last_accessed_at", raw))
            .transpose()?,
        created_at: parse_time("created_at", &row.created_at)?,
        id: row.id,
        value: row.value,
        is_active: row.is_active,
        allowed_pages,
        access_log,
        access_count,
        label: row.label,
    })
}

fn append_access(
    conn: &mut Connection,
    token_id: &str,
    entry: &AccessLogEntry,
    cap: usize,
    deadline: Instant,
) -> Result<()> {
    let timestamp = format_time(&entry.timestamp);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let updated = tx.execute(
        "UPDATE tokens SET access_count = access_count + 1, last_accessed_at = ?2 WHERE id = ?1",
        params![token_id, timestamp],
    )?;
    if updated == 0 {
        return Err(PageGateError::NotFound(format!("Token {} not found", token_id)));
    }

    tx.execute(
        "INSERT INTO access_log (token_id, timestamp, page, ip, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![token_id, timestamp, entry.page, entry.ip, entry.user_agent],
    )?;
    tx.execute(
        "DELETE FROM access_log WHERE token_id = ?1 AND seq NOT IN (
             SELECT seq FROM access_log WHERE token_id = ?1 ORDER BY seq DESC LIMIT ?2
         )",
        params![token_id, cap as i64],
    )?;

    // Dropping the uncommitted transaction rolls it back
    if Instant::now() >= deadline {
        return Err(PageGateError::Timeout);
    }
    tx.commit()?;
    Ok(())
}

fn upsert_token(conn: &mut Connection, token: &Token) -> Result<()> {
    let allowed_pages = serde_json::to_string(&token.allowed_pages)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    tx.execute(
        "INSERT INTO tokens (
             id, value, is_active, expires_at, allowed_pages,
             access_count, last_accessed_at, created_at, label
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
             value = excluded.value,
             is_active = excluded.is_active,
             expires_at = excluded.expires_at,
             allowed_pages = excluded.allowed_pages,
             access_count = excluded.access_count,
             last_accessed_at = excluded.last_accessed_at,
             created_at = excluded.created_at,
             label = excluded.label",
        params![
            token.id,
            token.value,
            token.is_active,
            format_time(&token.expires_at),
            allowed_pages,
            token.access_count as i64,
            token.last_accessed_at.as_ref().map(format_time),
            format_time(&token.created_at),
            token.label,
        ],
    )?;

    tx.execute("DELETE FROM access_log WHERE token_id = ?1", [&token.id])?;
    for entry in &token.access_log {
        tx.execute(
            "INSERT INTO access_log (token_id, timestamp, page, ip, user_agent)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                token.id,
                format_time(&entry.timestamp),
                entry.page,
                entry.ip,
                entry.user_agent
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

#[async_trait]
impl super::TokenStore for SqlStorage {
    async fn find_by_value(&self, value: &str) -> Result<Option<Token>> {
        let value = value.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, value, is_active, expires_at, allowed_pages,
                            access_count, last_accessed_at, created_at, label
                     FROM tokens WHERE value = ?1",
                    [&value],
                    |row| {
                        Ok(TokenRow {
                            id: row.get(0)?,
                            value: row.get(1)?,
                            is_active: row.get(2)?,
                            expires_at: row.get(3)?,
                            allowed_pages: row.get(4)?,
                            access_count: row.get(5)?,
                            last_accessed_at: row.get(6)?,
                            created_at: row.get(7)?,
                            label: row.get(8)?,
                        })
                    },
                )
                .optional()?;

            match row {
                Some(row) => {
                    let access_log = load_access_log(conn, &row.id)?;
                    decode_token(row, access_log).map(Some)
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn append_access_and_bump(
        &self,
        token_id: &str,
        entry: AccessLogEntry,
        cap: usize,
        deadline: Instant,
    ) -> Result<()> {
        let token_id = token_id.to_string();
        self.with_conn_until(deadline, move |conn| {
            append_access(conn, &token_id, &entry, cap, deadline)?;
            debug!(token_id = %token_id, "Recorded access");
            Ok(())
        })
        .await
    }

    async fn put_token(&self, token: Token) -> Result<()> {
        self.with_conn(move |conn| upsert_token(conn, &token)).await
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        self.with_conn(|conn| {
            let (total_tokens, total_accesses): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(access_count), 0) FROM tokens",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(StoreStats {
                total_tokens: total_tokens.max(0) as usize,
                total_accesses: total_accesses.max(0) as u64,
            })
        })
        .await
    }
}
