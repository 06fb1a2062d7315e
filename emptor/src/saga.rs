//! The saga orchestrator: S1 → S2 → S3 → S4 → (S5).

use std::sync::Arc;

use emptor_types::{
    CatalogSource, IdempotencyStore, IntentProvider, PriceRefSource, RecordSink, RerankProvider,
    RunOutput, SagaError, TrustAdjuster, VisionProvider, VisionRefiner,
};

use crate::config::{RunConfig, RunInputs};
use crate::context::RunContext;

/// The capability providers a [`Saga`] is built from.
///
/// `vision` and `catalog` are required; the rest are optional LLM-backed
/// collaborators that only run when the matching [`crate::LlmFlags`] flag is
/// set (except `price_refs`, which runs whenever present).
pub struct Capabilities {
    /// S1 detector.
    pub vision: Arc<dyn VisionProvider>,
    /// S3 catalog.
    pub catalog: Arc<dyn CatalogSource>,
    /// S1 refinement pass.
    pub vision_refiner: Option<Arc<dyn VisionRefiner>>,
    /// S2 LLM extraction.
    pub intent: Option<Arc<dyn IntentProvider>>,
    /// S3 LLM reranking.
    pub reranker: Option<Arc<dyn RerankProvider>>,
    /// S4 LLM adjustment.
    pub trust_adjuster: Option<Arc<dyn TrustAdjuster>>,
    /// S4 anomaly reference statistics.
    pub price_refs: Option<Arc<dyn PriceRefSource>>,
}

impl Capabilities {
    /// Capabilities with only the required providers.
    #[must_use]
    pub fn new(vision: Arc<dyn VisionProvider>, catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            vision,
            catalog,
            vision_refiner: None,
            intent: None,
            reranker: None,
            trust_adjuster: None,
            price_refs: None,
        }
    }

    /// Attach a vision refiner.
    #[must_use]
    pub fn with_vision_refiner(mut self, refiner: Arc<dyn VisionRefiner>) -> Self {
        self.vision_refiner = Some(refiner);
        self
    }

    /// Attach an intent provider.
    #[must_use]
    pub fn with_intent(mut self, intent: Arc<dyn IntentProvider>) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Attach a rerank provider.
    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn RerankProvider>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Attach a trust adjuster.
    #[must_use]
    pub fn with_trust_adjuster(mut self, adjuster: Arc<dyn TrustAdjuster>) -> Self {
        self.trust_adjuster = Some(adjuster);
        self
    }

    /// Attach a price reference source.
    #[must_use]
    pub fn with_price_refs(mut self, refs: Arc<dyn PriceRefSource>) -> Self {
        self.price_refs = Some(refs);
        self
    }
}

/// The purchase saga engine.
///
/// Drives the linear stage graph over the injected capabilities. A `Saga` is
/// cheap to share and runs are independent: each run gets its own
/// [`RunContext`] and token budgeter.
pub struct Saga {
    pub(crate) caps: Capabilities,
    pub(crate) store: Arc<dyn IdempotencyStore>,
    pub(crate) config: RunConfig,
    pub(crate) sink: Option<Arc<dyn RecordSink>>,
}

impl Saga {
    /// Build a saga engine from capabilities, the receipt store, and a
    /// frozen configuration.
    #[must_use]
    pub fn new(caps: Capabilities, store: Arc<dyn IdempotencyStore>, config: RunConfig) -> Self {
        Self { caps, store, config, sink: None }
    }

    /// Mirror stage events, messages, token events, and run results into an
    /// append-only record sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The engine's frozen configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run S1–S4 only: capture, intent, sourcing, trust. No payment needed
    /// and no receipt produced.
    ///
    /// # Errors
    ///
    /// Returns [`SagaError`] when the inputs fail preconditions or any stage
    /// fails hard; soft failures end the run gracefully inside the output.
    pub async fn run_preview(&self, inputs: RunInputs) -> Result<RunOutput, SagaError> {
        self.drive(inputs, false).await
    }

    /// Run the full saga S1–S5. Requires a payment input.
    ///
    /// # Errors
    ///
    /// As [`Saga::run_preview`], plus [`SagaError::Admission`] when checkout
    /// rejects the payment.
    pub async fn run_full(&self, inputs: RunInputs) -> Result<RunOutput, SagaError> {
        self.drive(inputs, true).await
    }

    async fn drive(&self, inputs: RunInputs, checkout: bool) -> Result<RunOutput, SagaError> {
        if inputs.image.trim().is_empty() {
            return Err(SagaError::InvalidInput("missing image".into()));
        }
        if checkout && inputs.payment.is_none() {
            return Err(SagaError::InvalidInput("missing payment".into()));
        }

        let mut ctx = RunContext::new(inputs, &self.config, self.sink.clone());
        tracing::debug!(run_id = %ctx.run_id(), checkout, "saga start");

        self.stage_capture(&mut ctx).await?;
        self.stage_confirm(&mut ctx).await?;
        self.stage_source(&mut ctx).await?;
        self.stage_trust(&mut ctx).await?;
        if checkout {
            self.stage_checkout(&mut ctx).await?;
        }

        tracing::debug!(
            run_id = %ctx.run_id(),
            offers = ctx.offers.len(),
            receipt = ctx.receipt.is_some(),
            "saga complete"
        );
        Ok(ctx.into_output())
    }
}
