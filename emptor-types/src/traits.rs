//! Capability and collaborator traits.
//!
//! Every external dependency of the saga engine is one of these traits,
//! injected at construction. Each trait has a deterministic default
//! implementation in `emptor-providers` or `emptor-store-memory`; LLM-backed
//! variants are supplied by the host and gated by run-config feature flags.

use async_trait::async_trait;

use crate::error::{ProviderError, StoreError};
use crate::events::LogRecord;
use crate::types::{
    CatalogItem, MetricRefs, Offer, ProductHypothesis, PurchaseIntent, Receipt, TrustAssessment,
    VendorProfile,
};

/// Turns an image handle into a product hypothesis.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Detect the product in `image`. A provider that recognizes nothing
    /// returns the low-confidence unknown-object hypothesis rather than
    /// erroring.
    async fn detect(&self, image: &str) -> Result<ProductHypothesis, ProviderError>;
}

/// Optional second-pass refinement of a hypothesis (S1 refinement flag).
#[async_trait]
pub trait VisionRefiner: Send + Sync {
    /// Refine `hypothesis` for `image`. Errors keep the unrefined hypothesis.
    async fn refine(
        &self,
        hypothesis: &ProductHypothesis,
        image: &str,
    ) -> Result<ProductHypothesis, ProviderError>;
}

/// LLM-backed intent extraction (S2 flag). Errors fall back to the
/// deterministic grammar.
#[async_trait]
pub trait IntentProvider: Send + Sync {
    /// Extract a purchase intent from the hypothesis and free-form text.
    async fn extract(
        &self,
        hypothesis: &ProductHypothesis,
        user_text: Option<&str>,
    ) -> Result<PurchaseIntent, ProviderError>;
}

/// Read-only catalog of purchasable items.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Load the full catalog. Implementations cache after the first load.
    async fn load(&self) -> Result<Vec<CatalogItem>, ProviderError>;
}

/// LLM-backed offer reranking (S3 flag). Errors keep deterministic order.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    /// Model identifier, used for token counting and accounting.
    fn model(&self) -> &str;

    /// Return offer indices in descending preference. Indices outside
    /// `0..offers.len()` are ignored by the caller; missing indices are
    /// appended in original order; duplicates keep the first occurrence.
    async fn rerank(
        &self,
        intent: &PurchaseIntent,
        offers: &[Offer],
        max_output_tokens: Option<u64>,
    ) -> Result<Vec<usize>, ProviderError>;
}

/// LLM-backed trust adjustment (S4 flag). Errors keep the deterministic
/// assessment.
#[async_trait]
pub trait TrustAdjuster: Send + Sync {
    /// Adjust the rule-based assessment given the offer and vendor profile.
    async fn adjust(
        &self,
        offer: &Offer,
        assessment: TrustAssessment,
        profile: &VendorProfile,
    ) -> Result<TrustAssessment, ProviderError>;
}

/// Read-only robust reference statistics for anomaly scoring.
#[async_trait]
pub trait PriceRefSource: Send + Sync {
    /// Look up reference stats for a (brand, category) pair. Implementations
    /// resolve the most specific bucket available per metric, falling back
    /// brand-only → category-only → global. `None` when no bucket matches.
    async fn lookup(
        &self,
        brand: Option<&str>,
        category: Option<&str>,
    ) -> Result<Option<MetricRefs>, ProviderError>;
}

/// Receipt store and card-velocity counters. Mutated only by checkout;
/// implementations must serialize access.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Fetch the receipt stored under `key`, if any.
    async fn get(&self, key: &str) -> Option<Receipt>;

    /// Store `receipt` under `key` unless the key is already present.
    /// Returns the receipt that is stored after the call: the existing one
    /// on collision, otherwise the new one.
    async fn put_if_absent(&self, key: &str, receipt: Receipt) -> Receipt;

    /// Current failed-attempt count for a card.
    async fn velocity(&self, card: &str) -> u32;

    /// Record a failed attempt for a card; returns the new count.
    async fn bump_velocity(&self, card: &str) -> u32;

    /// Clear the failed-attempt count for a card.
    async fn reset_velocity(&self, card: &str);
}

/// Append-only sink for the persisted run log. Writes are best-effort from
/// the engine's point of view: a failing sink is logged, never fatal.
pub trait RecordSink: Send + Sync {
    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when serialization or the underlying write
    /// fails.
    fn append(&self, record: &LogRecord) -> Result<(), StoreError>;
}
