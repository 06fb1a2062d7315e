#![deny(missing_docs)]
//! Shared types for the emptor purchase saga.
//!
//! This crate defines the data model every other emptor crate speaks:
//! the stage vocabulary and event log records, the domain entities
//! (hypothesis, intent, offer, trust assessment, receipt), the capability
//! traits the engine is parameterized over, and the error enums.
//!
//! It deliberately contains no behavior beyond constructors and small
//! invariant helpers. The engine lives in `emptor`, default providers in
//! `emptor-providers`, and stores in `emptor-store-memory` / `emptor-store-fs`.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use error::{AdmissionError, ProviderError, SagaError, StoreError};
pub use events::{
    AgentMessage, EventKind, LogRecord, RunOutput, Stage, StageEvent, TokenEvent, TokenPolicy,
    TokenRole,
};
pub use traits::{
    CatalogSource, IdempotencyStore, IntentProvider, PriceRefSource, RecordSink, RerankProvider,
    TrustAdjuster, VisionProvider, VisionRefiner,
};
pub use types::{
    BoundingBox, CardBrand, CatalogItem, MetricRefs, MetricStats, Offer, PaymentInput,
    ProductHypothesis, PurchaseIntent, Receipt, RiskBand, TrustAssessment, VendorProfile,
    normalize_url, COLOR_VOCAB,
};
