//! Credential store collaborator and an in-memory implementation.
//!
//! The handshake keeps the temporary credential under the flow identifier
//! across the authorization redirect, then replaces it with the access
//! credential once verified. Hosts choose the medium and its retention.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use rand::RngExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::{CredentialKind, StoredCredential};
use crate::error::StoreError;
use crate::source::{ClockSource, SystemClock};

/// Identifies one handshake and its credential-store entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(String);

impl FlowId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random identifier (32 hex characters).
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(hex::encode(bytes))
    }

    /// The identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persists credentials keyed by flow identifier. Implemented by the host.
///
/// Hosts should evict stale temporary credentials; abandoned flows never
/// clean up after themselves.
pub trait CredentialStore: Send + Sync {
    /// Store (or replace) the credential for a flow.
    fn put(&self, flow_id: &FlowId, credential: StoredCredential) -> Result<(), StoreError>;

    /// Fetch the credential for a flow, or [`StoreError::NotFound`].
    fn get(&self, flow_id: &FlowId) -> Result<StoredCredential, StoreError>;

    /// Remove the credential for a flow. Removing a missing entry is not an error.
    fn delete(&self, flow_id: &FlowId) -> Result<(), StoreError>;
}

/// In-memory store with optional expiry of temporary credentials.
pub struct MemoryStore {
    entries: RwLock<HashMap<FlowId, StoredCredential>>,
    ttl: Option<u64>,
    clock: Box<dyn ClockSource>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: None,
            clock: Box::new(SystemClock),
        }
    }
}

impl MemoryStore {
    /// Create an empty store whose entries never expire.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire temporary credentials `ttl_secs` after they were stored.
    ///
    /// Access credentials never expire.
    #[must_use]
    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl = Some(ttl_secs);
        self
    }

    /// Replace the clock used for expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: impl ClockSource + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired temporary credential; returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired temporary credentials");
        }
        Ok(removed)
    }

    fn is_expired(&self, entry: &StoredCredential, now: u64) -> bool {
        match (self.ttl, entry.kind) {
            (Some(ttl), CredentialKind::Temporary) => now.saturating_sub(entry.stored_at) >= ttl,
            _ => false,
        }
    }
}

impl CredentialStore for MemoryStore {
    fn put(&self, flow_id: &FlowId, credential: StoredCredential) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(flow_id.clone(), credential);
        Ok(())
    }

    fn get(&self, flow_id: &FlowId) -> Result<StoredCredential, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        match entries.get(flow_id) {
            Some(entry) if self.is_expired(entry, now) => {
                debug!(flow_id = %flow_id, "Temporary credential expired");
                entries.remove(flow_id);
                Err(StoreError::NotFound(flow_id.clone()))
            }
            Some(entry) => Ok(entry.clone()),
            None => Err(StoreError::NotFound(flow_id.clone())),
        }
    }

    fn delete(&self, flow_id: &FlowId) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.remove(flow_id);
        Ok(())
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("memory store lock poisoned".to_owned())
}
