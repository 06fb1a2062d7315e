//! Per-run mutable state: inputs, accumulators, clock, and budgeter.

use std::sync::Arc;
use std::time::Instant;

use emptor_budget::TokenBudgeter;
use emptor_types::{
    AgentMessage, LogRecord, Offer, ProductHypothesis, PurchaseIntent, Receipt, RecordSink,
    RunOutput, StageEvent, TrustAssessment,
};

use crate::config::{ResolvedCompensation, RunConfig, RunInputs};

/// Everything one saga run accumulates.
///
/// Created at entry, threaded through every stage, converted into a
/// [`RunOutput`] at completion. Never shared across runs.
pub struct RunContext {
    run_id: String,
    started: Instant,
    /// The caller's inputs, immutable for the run.
    pub inputs: RunInputs,
    pub(crate) comp: ResolvedCompensation,
    /// Token accountant for the run.
    pub budgeter: Arc<TokenBudgeter>,
    sink: Option<Arc<dyn RecordSink>>,
    events: Vec<StageEvent>,
    messages: Vec<AgentMessage>,
    /// S1 output.
    pub hypothesis: Option<ProductHypothesis>,
    /// S2 output.
    pub intent: Option<PurchaseIntent>,
    /// S3 output, best offer first after S4.
    pub offers: Vec<Offer>,
    /// The offer carried into trust evaluation and checkout.
    pub best_offer: Option<Offer>,
    /// The authoritative trust verdict.
    pub trust: Option<TrustAssessment>,
    /// S5 output.
    pub receipt: Option<Receipt>,
}

impl RunContext {
    pub(crate) fn new(
        inputs: RunInputs,
        config: &RunConfig,
        sink: Option<Arc<dyn RecordSink>>,
    ) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut budgets = config.token_budgets.clone();
        if let Some(overrides) = &inputs.token_budgets {
            budgets.extend(overrides.iter().map(|(stage, budget)| (*stage, *budget)));
        }
        let policy = inputs.token_policy.unwrap_or(config.token_policy);
        let mut budgeter = TokenBudgeter::new(run_id.clone(), budgets, policy)
            .with_output_safety(config.token_output_safety)
            .started_at(started);
        if let Some(sink) = &sink {
            budgeter = budgeter.with_sink(Arc::clone(sink));
        }
        let comp = ResolvedCompensation::resolve(config, &inputs);
        Self {
            run_id,
            started,
            inputs,
            comp,
            budgeter: Arc::new(budgeter),
            sink,
            events: Vec::new(),
            messages: Vec::new(),
            hypothesis: None,
            intent: None,
            offers: Vec::new(),
            best_offer: None,
            trust: None,
            receipt: None,
        }
    }

    /// Unique id of this run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Milliseconds since the run started. Monotonic.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// The stage events appended so far, in order.
    #[must_use]
    pub fn events(&self) -> &[StageEvent] {
        &self.events
    }

    /// The inter-agent messages appended so far, in order.
    #[must_use]
    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    /// Append a stage event and mirror it to the record sink.
    pub(crate) fn record_event(&mut self, event: StageEvent) {
        self.persist(&LogRecord::StageEvent(event.clone()));
        self.events.push(event);
    }

    /// Append an inter-agent message and mirror it to the record sink.
    pub(crate) fn record_message(&mut self, message: AgentMessage) {
        self.persist(&LogRecord::Message(message.clone()));
        self.messages.push(message);
    }

    /// Sink writes are best-effort: a broken sink must not fail the run.
    fn persist(&self, record: &LogRecord) {
        if let Some(sink) = &self.sink
            && let Err(err) = sink.append(record)
        {
            tracing::warn!(run_id = %self.run_id, error = %err, "failed to persist run record");
        }
    }

    /// Consume the context into the run's result payload, persisting the
    /// full run record.
    pub(crate) fn into_output(self) -> RunOutput {
        let output = RunOutput {
            run_id: self.run_id.clone(),
            hypothesis: self.hypothesis,
            intent: self.intent,
            offers: self.offers,
            offer: self.best_offer,
            trust: self.trust,
            receipt: self.receipt,
            log: self.events,
            messages: self.messages,
            token_events: self.budgeter.events(),
        };
        if let Some(sink) = &self.sink
            && let Err(err) = sink.append(&LogRecord::Run(output.clone()))
        {
            tracing::warn!(run_id = %output.run_id, error = %err, "failed to persist run result");
        }
        output
    }
}

/// Round a duration in seconds to 4 decimals, the event-log convention.
pub(crate) fn round4(dt_s: f64) -> f64 {
    (dt_s * 10_000.0).round() / 10_000.0
}

/// Round to 3 decimals, used for confidence annotations.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1_000.0).round() / 1_000.0
}

/// Round to 2 decimals, used for price-delta annotations.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use emptor_types::EventKind;

    #[test]
    fn events_and_messages_append_in_order() {
        let mut ctx = RunContext::new(RunInputs::new("img.jpg"), &RunConfig::default(), None);
        ctx.record_event(StageEvent::succeeded(EventKind::Capture, 0.1, ctx.elapsed_ms()));
        ctx.record_event(StageEvent::succeeded(EventKind::Confirm, 0.2, ctx.elapsed_ms()));
        ctx.record_message(AgentMessage::new(
            EventKind::Confirm,
            "intent",
            "sourcing",
            "Need 1x pen",
            ctx.elapsed_ms(),
        ));
        assert_eq!(ctx.events().len(), 2);
        assert_eq!(ctx.events()[0].stage, EventKind::Capture);
        assert_eq!(ctx.messages().len(), 1);
        let output = ctx.into_output();
        assert_eq!(output.log.len(), 2);
        assert_eq!(output.messages.len(), 1);
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(round4(0.123_456), 0.1235);
        assert_eq!(round3(0.899_9), 0.9);
        assert_eq!(round2(33.333_333), 33.33);
    }
}
