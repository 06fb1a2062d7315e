#![deny(missing_docs)]
//! The emptor purchase saga engine.
//!
//! Given an image and an optional shopper utterance, the engine drives five
//! stages (capture, intent confirmation, sourcing, trust assessment,
//! checkout), producing a receipt or a terminal failure with a replayable
//! event log.
//!
//! The orchestration is the point: stages run under per-stage wall-clock
//! limits, sourcing fans out to two parallel strategies and merges the
//! union, trust can compensate onto a strictly safer offer inside bounded
//! price and latency envelopes, LLM provider calls are metered by a per-run
//! token budgeter, and checkout guarantees at-most-once monetary effect via
//! an idempotent receipt store.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use emptor::{Capabilities, RunConfig, RunInputs, Saga};
//! use emptor_providers::{HeuristicVision, StaticCatalog, StaticPriceRefs};
//! use emptor_store_memory::MemoryStore;
//! use emptor_types::PaymentInput;
//!
//! # async fn demo() -> Result<(), emptor_types::SagaError> {
//! let caps = Capabilities::new(Arc::new(HeuristicVision::new()), Arc::new(StaticCatalog::new()))
//!     .with_price_refs(Arc::new(StaticPriceRefs::new()));
//! let saga = Saga::new(caps, Arc::new(MemoryStore::new()), RunConfig::default());
//!
//! let inputs = RunInputs::new("nike_bottle_blue.jpg")
//!     .with_user_text("same water bottle qty 2 budget $40")
//!     .with_payment(PaymentInput {
//!         card_number: "4242424242424242".into(),
//!         expiry_mm_yy: "12/29".into(),
//!         cvv: "123".into(),
//!         amount_usd: 0.0,
//!     });
//! let output = saga.run_full(inputs).await?;
//! assert!(output.receipt.is_some());
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod payment;
mod runner;
mod saga;
mod stages;

pub use config::{LlmFlags, RunConfig, RunInputs};
pub use saga::{Capabilities, Saga};

// The engine's vocabulary is defined in emptor-types; re-export the pieces
// callers touch on every run.
pub use emptor_types::{RunOutput, SagaError};
