//! # Storage Module for Page Gate
//!
//! This module defines the token store contract and its backends.
//!
//! ## Architecture
//!
//! The module is built around the `TokenStore` trait. Validation only ever
//! needs two things from a store: an exact lookup by token value and a single
//! atomic audit update. Backends differ in persistence:
//!
//! * `MemoryStorage`: DashMap-backed, lost on restart
//! * `SqlStorage`: SQLite-backed, durable
//!
//! ## Usage
//!
//! ```rust,no_run
//! use page_gate::storage::{StorageFactory, StorageKind};
//!
//! let factory = StorageFactory::new("data/page_gate.db");
//! let store = factory.create(StorageKind::Sql).unwrap();
//! // store.find_by_value("abc").await?;
//! ```

use crate::error::{PageGateError, Result};
use crate::types::{AccessLogEntry, StoreStats, Token};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// DashMap-backed token store
pub mod memory_storage;
/// SQLite-backed token store
pub mod sql_storage;

pub use memory_storage::MemoryStorage;
pub use sql_storage::SqlStorage;

/// Durable record of tokens and their access history.
///
/// Implementations must make `append_access_and_bump` atomic per token:
/// concurrent calls for the same id must all be reflected in both the log and
/// the counter.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Look up a token by its exact value.
    ///
    /// Returns `None` when no token carries the value.
    async fn find_by_value(&self, value: &str) -> Result<Option<Token>>;

    /// Record one successful access.
    ///
    /// Pushes `entry` onto the token's access log, evicts the oldest entries
    /// beyond `cap`, increments `access_count` and sets `last_accessed_at` to
    /// the entry timestamp, all in one atomic step.
    ///
    /// # Errors
    ///
    /// Returns `PageGateError::NotFound` if no token has `token_id`.
    /// Returns `PageGateError::Timeout` if `deadline` passes before the update
    /// is applied, in which case the record is left untouched.
    async fn append_access_and_bump(
        &self,
        token_id: &str,
        entry: AccessLogEntry,
        cap: usize,
        deadline: Instant,
    ) -> Result<()>;

    /// Insert or replace a token record.
    ///
    /// This is the seeding entry point for the external issuance process.
    async fn put_token(&self, token: Token) -> Result<()>;

    /// Get store-wide counters
    async fn get_stats(&self) -> Result<StoreStats>;
}

/// Available store backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    #[default]
    Sql,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Memory => f.write_str("memory"),
            StorageKind::Sql => f.write_str("sql"),
        }
    }
}

impl FromStr for StorageKind {
    type Err = PageGateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(StorageKind::Memory),
            "sql" => Ok(StorageKind::Sql),
            other => Err(PageGateError::Config(format!(
                "Unknown storage type: {}",
                other
            ))),
        }
    }
}

/// Factory for creating token stores.
pub struct StorageFactory {
    /// Database path used by the sql backend
    database_path: String,
}

impl StorageFactory {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    /// Create a store of the given kind.
    pub fn create(&self, kind: StorageKind) -> Result<Arc<dyn TokenStore>> {
        match kind {
            StorageKind::Memory => Ok(self.create_memory_storage()),
            StorageKind::Sql => self.create_sql_storage(),
        }
    }

    pub fn create_memory_storage(&self) -> Arc<dyn TokenStore> {
        Arc::new(MemoryStorage::new())
    }

    /// Create a SQLite store, creating the parent directory if needed.
    pub fn create_sql_storage(&self) -> Result<Arc<dyn TokenStore>> {
        let storage = SqlStorage::open(&self.database_path)?;
        Ok(Arc::new(storage))
    }
}
