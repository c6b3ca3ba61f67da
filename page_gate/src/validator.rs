// Token validation for Page Gate
//
// The validator runs the ordered decision chain (existence, active flag,
// expiry, page allow-list) and, on success, records the access through the
// store's atomic audit update. Store faults never escape: lookup faults deny
// with TOKEN_NOT_FOUND and audit faults are logged and counted.

use crate::error::{PageGateError, Result};
use crate::storage::TokenStore;
use crate::types::{AccessLogEntry, DenyReason, LogContext, Token, Verdict, ACCESS_LOG_CAP};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub use crate::types::normalize_page;

/// Default timeout for a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Extra time given to a store to report the outcome of an audit update once
/// its own deadline has passed
const AUDIT_GRACE: Duration = Duration::from_millis(500);

/// How the audit update is dispatched after a successful validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuditMode {
    /// Await the update before returning the verdict
    #[default]
    Inline,
    /// Spawn the update and return the verdict immediately
    Detached,
}

/// Checks steps 2-4 of the decision chain against an already-loaded token.
///
/// `normalized_page` must come from [`normalize_page`]. The first failing
/// check wins.
pub fn check_token(
    token: &Token,
    normalized_page: &str,
    now: DateTime<Utc>,
) -> std::result::Result<(), DenyReason> {
    if !token.is_active {
        return Err(DenyReason::TokenInactive);
    }

    if token.is_expired_at(now) {
        return Err(DenyReason::TokenExpired);
    }

    if !token.allowed_pages.permits(normalized_page) {
        return Err(DenyReason::PageNotAllowed);
    }

    Ok(())
}

/// Stateless validator over a shared token store
#[derive(Clone)]
pub struct TokenValidator {
    store: Arc<dyn TokenStore>,
    store_timeout: Duration,
    audit_mode: AuditMode,
    audit_failures: Arc<AtomicU64>,
}

impl TokenValidator {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            audit_mode: AuditMode::default(),
            audit_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn with_audit_mode(mut self, audit_mode: AuditMode) -> Self {
        self.audit_mode = audit_mode;
        self
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Number of audit updates that failed since the validator was created
    pub fn audit_failures(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    /// Validate `token_value` for `page`.
    ///
    /// When `log_ctx` is given and the verdict is `Valid`, the access is
    /// appended to the token's log. The verdict does not depend on whether
    /// that update succeeds.
    pub async fn validate(
        &self,
        token_value: &str,
        page: &str,
        log_ctx: Option<&LogContext>,
    ) -> Verdict {
        let now = Utc::now();

        if token_value.is_empty() {
            debug!("Rejected empty token value");
            return Verdict::invalid(DenyReason::TokenNotFound);
        }

        let token = match self.lookup(token_value).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No token matches the presented value");
                return Verdict::invalid(DenyReason::TokenNotFound);
            }
            Err(e) => {
                error!("Token lookup failed, denying access: {}", e);
                return Verdict::invalid(DenyReason::TokenNotFound);
            }
        };

        let normalized_page = normalize_page(page);
        if let Err(reason) = check_token(&token, &normalized_page, now) {
            debug!(token_id = %token.id, page = %normalized_page, %reason, "Access denied");
            return Verdict::invalid(reason);
        }

        if let Some(ctx) = log_ctx {
            let entry = AccessLogEntry {
                timestamp: now,
                page: normalized_page.clone(),
                ip: ctx.ip.clone(),
                user_agent: ctx.user_agent.clone(),
            };
            self.record_access(&token.id, entry).await;
        }

        info!(token_id = %token.id, page = %normalized_page, "Access granted");
        Verdict::Valid { token }
    }

    async fn lookup(&self, token_value: &str) -> Result<Option<Token>> {
        tokio::time::timeout(self.store_timeout, self.store.find_by_value(token_value))
            .await
            .map_err(|_| PageGateError::Timeout)?
    }

    async fn record_access(&self, token_id: &str, entry: AccessLogEntry) {
        let store = self.store.clone();
        let store_timeout = self.store_timeout;
        let failures = self.audit_failures.clone();
        let token_id = token_id.to_string();

        // The store enforces the deadline itself, so a Timeout from it means
        // nothing was written. The outer bound only catches a store that hangs.
        let deadline = Instant::now() + store_timeout;
        let update = async move {
            let result = tokio::time::timeout(
                store_timeout + AUDIT_GRACE,
                store.append_access_and_bump(&token_id, entry, ACCESS_LOG_CAP, deadline),
            )
            .await
            .map_err(|_| PageGateError::Timeout)
            .and_then(|r| r);

            if let Err(e) = result {
                failures.fetch_add(1, Ordering::Relaxed);
                warn!(token_id = %token_id, "Failed to record access: {}", e);
            }
        };

        match self.audit_mode {
            AuditMode::Inline => update.await,
            AuditMode::Detached => {
                tokio::spawn(update);
            }
        }
    }
}
