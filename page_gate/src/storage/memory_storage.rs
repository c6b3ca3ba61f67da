use crate::error::{PageGateError, Result};
use crate::types::{AccessLogEntry, StoreStats, Token};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// In-memory token store.
///
/// Records are keyed by token id. A second map indexes ids by token value.
/// Audit updates mutate the record under the map's per-entry write lock, so
/// concurrent updates of one token serialize.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    tokens: Arc<DashMap<String, Token>>,
    value_index: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl super::TokenStore for MemoryStorage {
    async fn find_by_value(&self, value: &str) -> Result<Option<Token>> {
        let id = match self.value_index.get(value) {
            Some(id) => id.value().clone(),
            None => return Ok(None),
        };

        Ok(self.tokens.get(&id).map(|token| token.value().clone()))
    }

    async fn append_access_and_bump(
        &self,
        token_id: &str,
        entry: AccessLogEntry,
        cap: usize,
        deadline: Instant,
    ) -> Result<()> {
        let mut token = self
            .tokens
            .get_mut(token_id)
            .ok_or_else(|| PageGateError::NotFound(format!("Token {} not found", token_id)))?;
        if Instant::now() >= deadline {
            return Err(PageGateError::Timeout);
        }

        token.record_access(entry, cap);
        debug!(token_id, access_count = token.access_count, "Recorded access");
        Ok(())
    }

    async fn put_token(&self, token: Token) -> Result<()> {
        // Reserve the value under its shard lock before touching the record
        match self.value_index.entry(token.value.clone()) {
            Entry::Occupied(owner) if owner.get() != &token.id => {
                return Err(PageGateError::Storage(format!(
                    "Token value already assigned to {}",
                    owner.get()
                )));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(token.id.clone());
            }
        }

        if let Some(previous) = self.tokens.insert(token.id.clone(), token.clone()) {
            if previous.value != token.value {
                self.value_index
                    .remove_if(&previous.value, |_, owner| owner == &token.id);
            }
        }
        Ok(())
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        let total_accesses = self.tokens.iter().map(|t| t.access_count).sum();
        Ok(StoreStats {
            total_tokens: self.tokens.len(),
            total_accesses,
        })
    }
}
