//! Stage events, inter-agent messages, and token accounting records.
//!
//! All timestamps are milliseconds since run start, not wall clock, so they
//! are monotonic within a run and stable under replay.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Offer, ProductHypothesis, PurchaseIntent, Receipt, TrustAssessment};

/// One of the five saga stages. The budget and timeout unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Vision capture.
    S1,
    /// Intent confirmation.
    S2,
    /// Offer sourcing.
    S3,
    /// Trust assessment and compensation.
    S4,
    /// Checkout.
    S5,
}

impl Stage {
    /// All stages in declared order.
    pub const ALL: [Stage; 5] = [Stage::S1, Stage::S2, Stage::S3, Stage::S4, Stage::S5];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::S1 => "S1",
            Stage::S2 => "S2",
            Stage::S3 => "S3",
            Stage::S4 => "S4",
            Stage::S5 => "S5",
        };
        f.write_str(s)
    }
}

/// Event-log label vocabulary, ordered by declared stage order.
///
/// `S3_BRANCH` and `S4_COMPENSATE` are sub-stage labels of S3 and S4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// S1 vision capture completed.
    #[serde(rename = "S1_CAPTURE")]
    Capture,
    /// S2 intent confirmation completed.
    #[serde(rename = "S2_CONFIRM")]
    Confirm,
    /// S3 parallel strategy fan-out joined.
    #[serde(rename = "S3_BRANCH")]
    Branch,
    /// S3 merged offer list produced.
    #[serde(rename = "S3_SOURCING")]
    Sourcing,
    /// S4 trust verdict for the best offer.
    #[serde(rename = "S4_TRUST")]
    Trust,
    /// S4 compensation candidate evaluated.
    #[serde(rename = "S4_COMPENSATE")]
    Compensate,
    /// S5 checkout completed or refused.
    #[serde(rename = "S5_CHECKOUT")]
    Checkout,
}

impl EventKind {
    /// The stage this label belongs to.
    #[must_use]
    pub fn stage(self) -> Stage {
        match self {
            EventKind::Capture => Stage::S1,
            EventKind::Confirm => Stage::S2,
            EventKind::Branch | EventKind::Sourcing => Stage::S3,
            EventKind::Trust | EventKind::Compensate => Stage::S4,
            EventKind::Checkout => Stage::S5,
        }
    }
}

/// One append-only entry in a run's stage event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// Which stage label this event carries.
    pub stage: EventKind,
    /// Wall time the stage spent, in seconds, rounded to 4 decimals.
    pub dt_s: f64,
    /// Whether the stage succeeded.
    pub ok: bool,
    /// Milliseconds since run start at append time.
    pub ts_ms: u64,
    /// Caller-supplied annotations; null values are never stored.
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}

impl StageEvent {
    /// A successful event with no annotations yet.
    #[must_use]
    pub fn succeeded(stage: EventKind, dt_s: f64, ts_ms: u64) -> Self {
        Self { stage, dt_s, ok: true, ts_ms, detail: serde_json::Map::new() }
    }

    /// A failed event carrying the failure reason.
    #[must_use]
    pub fn failed(stage: EventKind, dt_s: f64, ts_ms: u64, reason: impl Into<String>) -> Self {
        Self { stage, dt_s, ok: false, ts_ms, detail: serde_json::Map::new() }
            .with("reason", reason.into())
    }

    /// Attach an annotation. Null values are dropped, mirroring the log's
    /// "absent means unknown" convention.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.detail.insert(key.to_string(), value);
        }
        self
    }
}

/// Inter-agent narration for audit and UI display. Never gates control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Which stage label this message belongs to.
    pub stage: EventKind,
    /// Emitting agent (vision, intent, sourcing, trust, checkout).
    pub sender: String,
    /// Receiving agent, or "user".
    pub recipient: String,
    /// The narration text.
    pub content: String,
    /// Milliseconds since run start at append time.
    pub ts_ms: u64,
    /// Optional structured annotations; null values are never stored.
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}

impl AgentMessage {
    /// Create a message with no annotations yet.
    #[must_use]
    pub fn new(
        stage: EventKind,
        sender: &str,
        recipient: &str,
        content: impl Into<String>,
        ts_ms: u64,
    ) -> Self {
        Self {
            stage,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            content: content.into(),
            ts_ms,
            detail: serde_json::Map::new(),
        }
    }

    /// Attach an annotation. Null values are dropped.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.detail.insert(key.to_string(), value);
        }
        self
    }
}

/// What a charged token was used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenRole {
    /// Prompt-side tokens.
    Prompt,
    /// Completion-side tokens.
    Completion,
    /// System-prompt tokens.
    System,
}

/// What the budgeter does when a call would exceed the stage cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPolicy {
    /// Log and proceed unchanged.
    Warn,
    /// Proceed with the provider's output tokens bound to what remains.
    Truncate,
    /// Skip the provider; deterministic output.
    Fallback,
    /// Refuse the call; the caller falls back.
    Block,
}

/// One token charge, appended on every `charge` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEvent {
    /// Milliseconds since run start at charge time.
    pub ts_ms: u64,
    /// The run being charged.
    pub run_id: String,
    /// The stage being charged.
    pub stage: Stage,
    /// Provider identifier (e.g. "llm").
    pub provider: String,
    /// Model identifier used for counting.
    pub model: String,
    /// What the tokens were used as.
    pub role: TokenRole,
    /// Tokens the caller attempted to charge (pre-clamp).
    pub n_tokens: u64,
    /// The stage cap in force.
    pub cap: u64,
    /// Whether this charge attempted to cross the cap.
    pub over_budget: bool,
    /// The policy in force for the run.
    pub policy: TokenPolicy,
}

/// The full result payload of one saga run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Unique id of this run.
    pub run_id: String,
    /// S1 output.
    pub hypothesis: Option<ProductHypothesis>,
    /// S2 output.
    pub intent: Option<PurchaseIntent>,
    /// S3 output, reordered so index 0 is the chosen best offer.
    pub offers: Vec<Offer>,
    /// The chosen best offer after any compensation swap.
    pub offer: Option<Offer>,
    /// The authoritative trust verdict for `offer`.
    pub trust: Option<TrustAssessment>,
    /// S5 output; absent on preview runs and soft failures.
    pub receipt: Option<Receipt>,
    /// Ordered stage event log.
    pub log: Vec<StageEvent>,
    /// Ordered inter-agent messages.
    pub messages: Vec<AgentMessage>,
    /// Ordered token charges.
    pub token_events: Vec<TokenEvent>,
}

/// Wire form for the append-only JSON-lines run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogRecord {
    /// A stage event.
    StageEvent(StageEvent),
    /// A token charge.
    Token(TokenEvent),
    /// An inter-agent message.
    Message(AgentMessage),
    /// A full run result.
    Run(RunOutput),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_serializes_as_stage_labels() {
        assert_eq!(serde_json::to_string(&EventKind::Branch).unwrap(), "\"S3_BRANCH\"");
        let back: EventKind = serde_json::from_str("\"S4_COMPENSATE\"").unwrap();
        assert_eq!(back, EventKind::Compensate);
    }

    #[test]
    fn event_kinds_follow_declared_stage_order() {
        let kinds = [
            EventKind::Capture,
            EventKind::Confirm,
            EventKind::Branch,
            EventKind::Sourcing,
            EventKind::Trust,
            EventKind::Compensate,
            EventKind::Checkout,
        ];
        for pair in kinds.windows(2) {
            assert!(pair[0].stage() <= pair[1].stage());
        }
    }

    #[test]
    fn stage_event_with_drops_nulls() {
        let none: Option<String> = None;
        let event = StageEvent::succeeded(EventKind::Capture, 0.1, 5)
            .with("label", "bottle")
            .with("brand", none);
        assert!(event.detail.contains_key("label"));
        assert!(!event.detail.contains_key("brand"));
    }

    #[test]
    fn stage_event_flattens_detail() {
        let event = StageEvent::succeeded(EventKind::Sourcing, 0.0, 9).with("offer_count", 3);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stage"], "S3_SOURCING");
        assert_eq!(json["offer_count"], 3);
    }

    #[test]
    fn log_record_carries_type_discriminator() {
        let record = LogRecord::StageEvent(StageEvent::succeeded(EventKind::Trust, 0.2, 7));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "stage_event");
    }
}
