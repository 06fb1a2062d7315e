#![deny(missing_docs)]
//! In-memory implementation of the emptor `IdempotencyStore` trait.
//!
//! Receipts and card-velocity counters live in `HashMap`s behind a single
//! `RwLock`, so concurrent saga runs see serialized reads and writes. Both
//! maps are unbounded: entries live for the process lifetime, and retention
//! is the host's responsibility.

use std::collections::HashMap;

use async_trait::async_trait;
use emptor_types::{IdempotencyStore, Receipt};
use tokio::sync::RwLock;

/// In-memory receipt store and card-velocity counter.
///
/// Suitable for testing, prototyping, and single-process deployments where
/// receipts need not survive a restart.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    receipts: HashMap<String, Receipt>,
    velocity: HashMap<String, u32>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }

    /// Number of receipts currently stored.
    pub async fn receipt_count(&self) -> usize {
        self.inner.read().await.receipts.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Receipt> {
        self.inner.read().await.receipts.get(key).cloned()
    }

    async fn put_if_absent(&self, key: &str, receipt: Receipt) -> Receipt {
        let mut inner = self.inner.write().await;
        inner.receipts.entry(key.to_string()).or_insert(receipt).clone()
    }

    async fn velocity(&self, card: &str) -> u32 {
        self.inner.read().await.velocity.get(card).copied().unwrap_or(0)
    }

    async fn bump_velocity(&self, card: &str) -> u32 {
        let mut inner = self.inner.write().await;
        let count = inner.velocity.entry(card.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    async fn reset_velocity(&self, card: &str) {
        self.inner.write().await.velocity.insert(card.to_string(), 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emptor_types::CardBrand;

    fn receipt(order_id: &str, key: &str) -> Receipt {
        Receipt {
            order_id: order_id.to_string(),
            idempotency_key: key.to_string(),
            amount_usd: 25.0,
            vendor: "Mockazon".to_string(),
            card_brand: CardBrand::Visa,
            masked_card: "************4242".to_string(),
        }
    }

    #[tokio::test]
    async fn put_if_absent_keeps_the_first_receipt() {
        let store = MemoryStore::new();
        let first = store.put_if_absent("k", receipt("aaa", "k")).await;
        let second = store.put_if_absent("k", receipt("bbb", "k")).await;
        assert_eq!(first.order_id, "aaa");
        assert_eq!(second.order_id, "aaa");
        assert_eq!(store.receipt_count().await, 1);
    }

    #[tokio::test]
    async fn get_returns_stored_receipt() {
        let store = MemoryStore::new();
        assert!(store.get("k").await.is_none());
        store.put_if_absent("k", receipt("aaa", "k")).await;
        assert_eq!(store.get("k").await.map(|r| r.order_id), Some("aaa".to_string()));
    }

    #[tokio::test]
    async fn velocity_bumps_and_resets() {
        let store = MemoryStore::new();
        assert_eq!(store.velocity("4242").await, 0);
        assert_eq!(store.bump_velocity("4242").await, 1);
        assert_eq!(store.bump_velocity("4242").await, 2);
        store.reset_velocity("4242").await;
        assert_eq!(store.velocity("4242").await, 0);
    }
}
