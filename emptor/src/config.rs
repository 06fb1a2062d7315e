//! Engine configuration and per-run inputs.
//!
//! A [`RunConfig`] is frozen at engine construction. Per-request knobs
//! (compensation bounds, token budgets and policy) live on [`RunInputs`] and
//! override the config for that run only; there is no process-wide mutable
//! configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use emptor_budget::StageBudget;
use emptor_types::{PaymentInput, Stage, TokenPolicy};

/// Feature flags selecting LLM-backed provider paths. Every flagged path
/// has a deterministic fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LlmFlags {
    /// Use the injected intent provider in S2.
    pub intent: bool,
    /// Use the injected rerank provider in S3.
    pub sourcing: bool,
    /// Use the injected trust adjuster in S4.
    pub trust: bool,
    /// Use the injected vision refiner in S1.
    pub vision_refine: bool,
}

/// Frozen engine configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Wall-clock limit per stage.
    pub stage_timeouts: BTreeMap<Stage, Duration>,
    /// Token budgets per stage.
    pub token_budgets: BTreeMap<Stage, StageBudget>,
    /// Policy when a provider call would exceed a stage's token cap.
    pub token_policy: TokenPolicy,
    /// Safety margin subtracted from remaining tokens when truncating.
    pub token_output_safety: u64,
    /// Offers kept per sourcing strategy before merging.
    pub sourcing_top_k: usize,
    /// Maximum compensation candidates evaluated.
    pub comp_top_k: usize,
    /// Acceptable price increase for a compensation switch, in percent.
    pub comp_price_window_pct: f64,
    /// Extra latency the compensation loop may spend.
    pub comp_extra_latency: Duration,
    /// Maximum chargeable amount in USD.
    pub checkout_max_amount: f64,
    /// Vendors refused at checkout.
    pub vendor_blacklist: BTreeSet<String>,
    /// Domain prefix listings are expected to live under; anything else is a
    /// domain mismatch.
    pub marketplace_prefix: String,
    /// LLM path selection.
    pub flags: LlmFlags,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stage_timeouts: BTreeMap::from([
                (Stage::S1, Duration::from_secs(12)),
                (Stage::S2, Duration::from_secs(10)),
                (Stage::S3, Duration::from_secs(18)),
                (Stage::S4, Duration::from_secs(12)),
                (Stage::S5, Duration::from_secs(16)),
            ]),
            token_budgets: emptor_budget::default_budgets(),
            token_policy: TokenPolicy::Truncate,
            token_output_safety: emptor_budget::DEFAULT_OUTPUT_SAFETY,
            sourcing_top_k: 5,
            comp_top_k: 3,
            comp_price_window_pct: 10.0,
            comp_extra_latency: Duration::from_millis(500),
            checkout_max_amount: 5000.0,
            vendor_blacklist: ["FraudCo", "ScamSupply", "UnknownMart"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            marketplace_prefix: "amazon".to_string(),
            flags: LlmFlags::default(),
        }
    }
}

impl RunConfig {
    /// The wall-clock limit for a stage.
    #[must_use]
    pub fn timeout(&self, stage: Stage) -> Duration {
        const FALLBACK: Duration = Duration::from_secs(30);
        self.stage_timeouts.get(&stage).copied().unwrap_or(FALLBACK)
    }
}

/// The caller's inputs for one saga run.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    /// Image handle to capture from. Required.
    pub image: String,
    /// Free-form shopper utterance.
    pub user_text: Option<String>,
    /// URL of an offer to prefer when it survives the merge.
    pub preferred_offer_url: Option<String>,
    /// Idempotency key for checkout; derived from the payload when absent.
    pub idempotency_key: Option<String>,
    /// Payment details; required for full runs.
    pub payment: Option<PaymentInput>,
    /// Per-run token budget overrides, merged over the config's.
    pub token_budgets: Option<BTreeMap<Stage, StageBudget>>,
    /// Per-run token policy override.
    pub token_policy: Option<TokenPolicy>,
    /// Per-run compensation candidate-count override.
    pub comp_top_k: Option<usize>,
    /// Per-run compensation price-window override, in percent.
    pub comp_price_window_pct: Option<f64>,
    /// Per-run compensation latency-cap override, in milliseconds.
    pub comp_extra_latency_ms: Option<u64>,
}

impl RunInputs {
    /// Inputs for `image` with everything else unset.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self { image: image.into(), ..Self::default() }
    }

    /// Set the shopper utterance.
    #[must_use]
    pub fn with_user_text(mut self, text: impl Into<String>) -> Self {
        self.user_text = Some(text.into());
        self
    }

    /// Set the payment details.
    #[must_use]
    pub fn with_payment(mut self, payment: PaymentInput) -> Self {
        self.payment = Some(payment);
        self
    }

    /// Set the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Compensation knobs after per-run overrides are applied.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedCompensation {
    pub(crate) top_k: usize,
    pub(crate) price_window_pct: f64,
    pub(crate) extra_latency: Duration,
}

impl ResolvedCompensation {
    pub(crate) fn resolve(config: &RunConfig, inputs: &RunInputs) -> Self {
        Self {
            top_k: inputs.comp_top_k.unwrap_or(config.comp_top_k),
            price_window_pct: inputs
                .comp_price_window_pct
                .unwrap_or(config.comp_price_window_pct),
            extra_latency: inputs
                .comp_extra_latency_ms
                .map_or(config.comp_extra_latency, Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_design_values() {
        let config = RunConfig::default();
        assert_eq!(config.timeout(Stage::S3), Duration::from_secs(18));
        assert_eq!(config.token_policy, TokenPolicy::Truncate);
        assert_eq!(config.comp_top_k, 3);
        assert_eq!(config.comp_price_window_pct, 10.0);
        assert_eq!(config.checkout_max_amount, 5000.0);
        assert!(config.vendor_blacklist.contains("FraudCo"));
    }

    #[test]
    fn per_run_overrides_win() {
        let config = RunConfig::default();
        let inputs = RunInputs {
            comp_top_k: Some(1),
            comp_extra_latency_ms: Some(50),
            ..RunInputs::new("img.jpg")
        };
        let resolved = ResolvedCompensation::resolve(&config, &inputs);
        assert_eq!(resolved.top_k, 1);
        assert_eq!(resolved.extra_latency, Duration::from_millis(50));
        assert_eq!(resolved.price_window_pct, 10.0);
    }
}
