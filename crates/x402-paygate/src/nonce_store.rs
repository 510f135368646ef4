//! Opt-in replay guard for the payment gate.
//!
//! The gate is stateless by default and leaves replay protection to the
//! facilitator. A [`NonceStore`] adds a per-nonce dedup set in front of the
//! settlement call. Each claim is held until the authorization it came from
//! expires; after that the codec rejects the header on its own.

use alloy::primitives::FixedBytes;
use dashmap::DashMap;

/// Storage for claimed authorization nonces.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait NonceStore: Send + Sync {
    /// Check if a nonce has already been claimed.
    fn is_used(&self, nonce: &FixedBytes<32>) -> bool;

    /// Atomically claim a nonce until `valid_before` (unix seconds), the
    /// expiry of the authorization carrying it.
    /// Returns `true` if it was unclaimed, `false` on a replay attempt.
    fn try_use(&self, nonce: FixedBytes<32>, valid_before: u64) -> bool;

    /// Release a claimed nonce after a settlement that moved no funds,
    /// so the payer can retry with the same authorization.
    fn release(&self, nonce: &FixedBytes<32>);

    /// Purge nonces whose authorization expired at or before `now` (unix
    /// seconds). Returns number purged.
    fn purge_expired(&self, now: u64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory nonce store backed by DashMap, keyed by nonce with the
/// authorization's `validBefore` as value. Lost on restart.
pub struct InMemoryNonceStore {
    nonces: DashMap<FixedBytes<32>, u64>,
}

impl InMemoryNonceStore {
    pub fn new() -> Self {
        Self {
            nonces: DashMap::new(),
        }
    }
}

impl Default for InMemoryNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceStore for InMemoryNonceStore {
    fn is_used(&self, nonce: &FixedBytes<32>) -> bool {
        self.nonces.contains_key(nonce)
    }

    fn try_use(&self, nonce: FixedBytes<32>, valid_before: u64) -> bool {
        // entry API holds the shard lock across check-and-insert
        use dashmap::mapref::entry::Entry;
        match self.nonces.entry(nonce) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(valid_before);
                true
            }
        }
    }

    fn release(&self, nonce: &FixedBytes<32>) {
        self.nonces.remove(nonce);
    }

    fn purge_expired(&self, now: u64) -> usize {
        let mut purged = 0;
        self.nonces.retain(|_, valid_before| {
            let keep = *valid_before > now;
            if !keep {
                purged += 1;
            }
            keep
        });
        if purged > 0 {
            tracing::debug!(purged, remaining = self.nonces.len(), "purged expired nonces");
        }
        purged
    }

    fn len(&self) -> usize {
        self.nonces.len()
    }
}
