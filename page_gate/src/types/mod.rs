// Types module for Page Gate
//
// This module defines the token record and access log types shared by the
// stores, the validator and the API layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod verdict;

pub use verdict::{DenyReason, RestrictionReason, Verdict};

/// Maximum number of access log entries retained per token
pub const ACCESS_LOG_CAP: usize = 100;

/// Allow-list entry granting every page
pub const WILDCARD_PAGE: &str = "*";

/// Document extension stripped from page names before comparison
pub const PAGE_EXTENSION: &str = ".html";

/// Normalize a page name for comparison and logging.
///
/// Lowercases the name and strips any trailing `.html` extensions, so
/// `"Report.HTML"`, `"report.html"` and `"report"` all become `"report"`.
/// Applying it twice gives the same result as applying it once.
pub fn normalize_page(page: &str) -> String {
    let mut normalized = page.to_lowercase();
    while let Some(stem) = normalized.strip_suffix(PAGE_EXTENSION) {
        let len = stem.len();
        normalized.truncate(len);
    }
    normalized
}

/// Pages a token may open.
///
/// Entries are stored as issued; comparison goes through [`normalize_page`]
/// on both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowedPages(Vec<String>);

impl AllowedPages {
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(pages.into_iter().map(Into::into).collect())
    }

    /// Allow-list containing only the wildcard marker
    pub fn all() -> Self {
        Self(vec![WILDCARD_PAGE.to_string()])
    }

    /// Check an already-normalized page name against the list
    pub fn permits(&self, normalized_page: &str) -> bool {
        self.0
            .iter()
            .map(|p| normalize_page(p))
            .any(|p| p == WILDCARD_PAGE || p == normalized_page)
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.iter().any(|p| p == WILDCARD_PAGE)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One recorded successful access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// When the access was granted
    pub timestamp: DateTime<Utc>,

    /// Normalized page name
    pub page: String,

    /// Client IP, if the request context supplied one
    pub ip: Option<String>,

    /// Client user agent, if the request context supplied one
    pub user_agent: Option<String>,
}

/// Request details recorded with a successful access
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl LogContext {
    pub fn new(ip: Option<String>, user_agent: Option<String>) -> Self {
        Self { ip, user_agent }
    }
}

/// Shareable access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Opaque unique identifier
    pub id: String,

    /// Secret value presented by clients, unique across tokens
    pub value: String,

    /// Inactive tokens are rejected regardless of expiry or pages
    pub is_active: bool,

    /// Token is invalid strictly after this instant
    pub expires_at: DateTime<Utc>,

    /// Pages the token may open
    pub allowed_pages: AllowedPages,

    /// Most recent accesses, oldest first, at most `ACCESS_LOG_CAP` entries
    #[serde(default)]
    pub access_log: Vec<AccessLogEntry>,

    /// Number of successful logged validations
    #[serde(default)]
    pub access_count: u64,

    /// Time of the most recent successful logged validation
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,

    /// Issuance time
    pub created_at: DateTime<Utc>,

    /// Free-form note about who the token was issued to
    #[serde(default)]
    pub label: Option<String>,
}

impl Token {
    /// Build an active token with a fresh id and an empty history
    pub fn new(
        value: impl Into<String>,
        expires_at: DateTime<Utc>,
        allowed_pages: AllowedPages,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            value: value.into(),
            is_active: true,
            expires_at,
            allowed_pages,
            access_log: Vec::new(),
            access_count: 0,
            last_accessed_at: None,
            created_at: Utc::now(),
            label: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Apply one audit update in place.
    ///
    /// Stores call this while holding whatever lock makes the update atomic.
    pub fn record_access(&mut self, entry: AccessLogEntry, cap: usize) {
        self.last_accessed_at = Some(entry.timestamp);
        self.access_log.push(entry);
        if self.access_log.len() > cap {
            let excess = self.access_log.len() - cap;
            self.access_log.drain(..excess);
        }
        self.access_count += 1;
    }
}

/// Store-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of token records
    pub total_tokens: usize,

    /// Sum of `access_count` across tokens
    pub total_accesses: u64,
}
