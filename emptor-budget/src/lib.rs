#![deny(missing_docs)]
//! Per-run token accounting for the emptor saga.
//!
//! A [`TokenBudgeter`] is created once per run with a per-stage cap table and
//! an overflow policy. Callers ask [`TokenBudgeter::enforce_before_call`]
//! what to do before every provider call and record actual usage with
//! [`TokenBudgeter::charge`]. Charges are clamped so recorded usage never
//! exceeds a stage's cap; the attempted amount and the overflow flag are
//! preserved on the emitted [`TokenEvent`].
//!
//! Counting is approximate (`len / 4`, floor, minimum 1) unless the `bpe`
//! feature is enabled and the model name contains "gpt".

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use emptor_types::{LogRecord, RecordSink, Stage, TokenEvent, TokenPolicy, TokenRole};

/// Estimated and maximum token usage for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageBudget {
    /// Typical usage, for capacity planning. Not enforced.
    pub est: u64,
    /// Hard per-run cap for the stage.
    pub cap: u64,
}

impl StageBudget {
    /// Create a budget from an estimate and a cap.
    #[must_use]
    pub fn new(est: u64, cap: u64) -> Self {
        Self { est, cap }
    }
}

/// The default per-stage budgets.
#[must_use]
pub fn default_budgets() -> BTreeMap<Stage, StageBudget> {
    BTreeMap::from([
        (Stage::S1, StageBudget::new(400, 800)),
        (Stage::S2, StageBudget::new(700, 1000)),
        (Stage::S3, StageBudget::new(1100, 1500)),
        (Stage::S4, StageBudget::new(900, 1200)),
        (Stage::S5, StageBudget::new(400, 800)),
    ])
}

/// What the caller should do about an upcoming provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenDecision {
    /// Within budget; proceed unchanged.
    Ok,
    /// Over budget, `warn` policy: proceed unchanged, caller logs.
    Warn,
    /// Over budget, `truncate` policy: proceed with the provider's output
    /// tokens bound to `max_output_tokens`.
    Truncate {
        /// What remains after the planned prompt and the safety margin.
        max_output_tokens: u64,
    },
    /// Over budget, `fallback` policy: skip the provider, use deterministic
    /// output, charge 0 prompt tokens.
    Fallback,
    /// Over budget, `block` policy: refuse the call; the caller records the
    /// refused charge and falls back.
    Block,
}

/// Per-run, per-stage token accountant.
///
/// Interior-mutable so stage futures can share it behind an `Arc`; the lock
/// is never held across an await point.
pub struct TokenBudgeter {
    run_id: String,
    policy: TokenPolicy,
    output_safety: u64,
    started: Instant,
    sink: Option<Arc<dyn RecordSink>>,
    inner: Mutex<Inner>,
}

struct Inner {
    budgets: BTreeMap<Stage, StageBudget>,
    used: BTreeMap<Stage, u64>,
    events: Vec<TokenEvent>,
}

/// Safety margin subtracted from the remaining budget when truncating, so a
/// slightly-off completion estimate cannot cross the cap.
pub const DEFAULT_OUTPUT_SAFETY: u64 = 32;

impl TokenBudgeter {
    /// Create a budgeter for one run. Stages missing from `budgets` are
    /// filled from [`default_budgets`].
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        budgets: BTreeMap<Stage, StageBudget>,
        policy: TokenPolicy,
    ) -> Self {
        let mut full = default_budgets();
        full.extend(budgets);
        Self {
            run_id: run_id.into(),
            policy,
            output_safety: DEFAULT_OUTPUT_SAFETY,
            started: Instant::now(),
            sink: None,
            inner: Mutex::new(Inner {
                budgets: full,
                used: BTreeMap::new(),
                events: Vec::new(),
            }),
        }
    }

    /// Override the truncation safety margin.
    #[must_use]
    pub fn with_output_safety(mut self, tokens: u64) -> Self {
        self.output_safety = tokens;
        self
    }

    /// Anchor event timestamps to an existing run clock instead of
    /// construction time.
    #[must_use]
    pub fn started_at(mut self, started: Instant) -> Self {
        self.started = started;
        self
    }

    /// Mirror every token event into a persisted record sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The policy in force for this run.
    #[must_use]
    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }

    /// The run this budgeter accounts for.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Tokens still available for a stage, floored at 0.
    #[must_use]
    pub fn remaining(&self, stage: Stage) -> u64 {
        let inner = self.lock();
        let cap = inner.budgets.get(&stage).map_or(u64::MAX, |b| b.cap);
        cap.saturating_sub(inner.used.get(&stage).copied().unwrap_or(0))
    }

    /// Tokens recorded against a stage so far.
    #[must_use]
    pub fn used(&self, stage: Stage) -> u64 {
        self.lock().used.get(&stage).copied().unwrap_or(0)
    }

    /// Decide what to do about a call that plans to spend
    /// `planned_prompt_tokens` on `stage`.
    #[must_use]
    pub fn enforce_before_call(&self, stage: Stage, planned_prompt_tokens: u64) -> TokenDecision {
        let remaining = self.remaining(stage);
        if planned_prompt_tokens <= remaining {
            return TokenDecision::Ok;
        }
        match self.policy {
            TokenPolicy::Warn => TokenDecision::Warn,
            TokenPolicy::Truncate => TokenDecision::Truncate {
                max_output_tokens: remaining
                    .saturating_sub(planned_prompt_tokens)
                    .saturating_sub(self.output_safety),
            },
            TokenPolicy::Fallback => TokenDecision::Fallback,
            TokenPolicy::Block => TokenDecision::Block,
        }
    }

    /// Record `n` tokens spent on `stage`. Usage is clamped at the cap; the
    /// event keeps the attempted amount and whether it crossed the cap.
    pub fn charge(&self, stage: Stage, provider: &str, model: &str, role: TokenRole, n: u64) {
        let ts_ms = self.started.elapsed().as_millis() as u64;
        let event = {
            let mut inner = self.lock();
            let cap = inner.budgets.get(&stage).map_or(u64::MAX, |b| b.cap);
            let used = inner.used.entry(stage).or_insert(0);
            let over_budget = used.saturating_add(n) > cap;
            *used += n.min(cap.saturating_sub(*used));
            let event = TokenEvent {
                ts_ms,
                run_id: self.run_id.clone(),
                stage,
                provider: provider.to_string(),
                model: model.to_string(),
                role,
                n_tokens: n,
                cap,
                over_budget,
                policy: self.policy,
            };
            inner.events.push(event.clone());
            event
        };
        if let Some(sink) = &self.sink
            && let Err(err) = sink.append(&LogRecord::Token(event))
        {
            tracing::warn!(error = %err, "failed to persist token event");
        }
    }

    /// All token events recorded so far, in charge order.
    #[must_use]
    pub fn events(&self) -> Vec<TokenEvent> {
        self.lock().events.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Count tokens for `text` as `model` would see it.
///
/// With the `bpe` feature enabled and a model name containing "gpt", uses
/// the tiktoken encoder; otherwise approximates as `len / 4` (floor) with a
/// minimum of 1 for non-empty text.
#[must_use]
pub fn count_tokens(model: &str, text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    if let Some(n) = bpe_count(model, text) {
        return n;
    }
    ((text.len() / 4) as u64).max(1)
}

#[cfg(feature = "bpe")]
fn bpe_count(model: &str, text: &str) -> Option<u64> {
    if !model.contains("gpt") {
        return None;
    }
    let bpe = tiktoken_rs::get_bpe_from_model(model)
        .or_else(|_| tiktoken_rs::cl100k_base())
        .ok()?;
    Some(bpe.encode_with_special_tokens(text).len() as u64)
}

#[cfg(not(feature = "bpe"))]
fn bpe_count(_model: &str, _text: &str) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budgeter(cap: u64, policy: TokenPolicy) -> TokenBudgeter {
        TokenBudgeter::new("run-1", BTreeMap::from([(Stage::S3, StageBudget::new(0, cap))]), policy)
    }

    #[test]
    fn count_tokens_approximates_len_over_four() {
        assert_eq!(count_tokens("mock", ""), 0);
        assert_eq!(count_tokens("mock", "abc"), 1);
        assert_eq!(count_tokens("mock", &"a".repeat(400)), 100);
    }

    #[test]
    fn within_budget_is_ok() {
        let b = budgeter(100, TokenPolicy::Block);
        assert_eq!(b.enforce_before_call(Stage::S3, 100), TokenDecision::Ok);
        assert_eq!(b.enforce_before_call(Stage::S3, 101), TokenDecision::Block);
    }

    #[test]
    fn decision_follows_policy() {
        assert_eq!(
            budgeter(10, TokenPolicy::Warn).enforce_before_call(Stage::S3, 50),
            TokenDecision::Warn
        );
        assert_eq!(
            budgeter(10, TokenPolicy::Fallback).enforce_before_call(Stage::S3, 50),
            TokenDecision::Fallback
        );
    }

    #[test]
    fn truncate_binds_output_to_remainder() {
        let b = budgeter(100, TokenPolicy::Truncate).with_output_safety(32);
        b.charge(Stage::S3, "llm", "mock", TokenRole::Prompt, 40);
        // remaining 60, planned 70: over budget, nothing left for output
        assert_eq!(
            b.enforce_before_call(Stage::S3, 70),
            TokenDecision::Truncate { max_output_tokens: 0 }
        );
    }

    #[test]
    fn charge_clamps_at_cap_but_records_attempt() {
        let b = budgeter(10, TokenPolicy::Block);
        b.charge(Stage::S3, "llm", "mock", TokenRole::Prompt, 25);
        assert_eq!(b.used(Stage::S3), 10);
        assert_eq!(b.remaining(Stage::S3), 0);
        let events = b.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].n_tokens, 25);
        assert!(events[0].over_budget);
        assert_eq!(events[0].policy, TokenPolicy::Block);
    }

    #[test]
    fn usage_never_exceeds_cap_across_charges() {
        let b = budgeter(100, TokenPolicy::Truncate);
        for _ in 0..10 {
            b.charge(Stage::S3, "llm", "mock", TokenRole::Completion, 17);
        }
        assert_eq!(b.used(Stage::S3), 100);
    }

    #[test]
    fn unknown_stage_falls_back_to_defaults() {
        let b = budgeter(10, TokenPolicy::Block);
        // S2 was not in the explicit table; the default cap applies.
        assert_eq!(b.remaining(Stage::S2), 1000);
    }
}
