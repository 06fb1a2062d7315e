//! S2 — intent confirmation.
//!
//! Default path is a fixed grammar over the lowercase utterance, seeded by
//! the S1 hypothesis. The LLM path (behind the `intent` flag) delegates to
//! the injected provider and falls back to the grammar on any error.

use std::sync::LazyLock;

use regex::Regex;

use emptor_types::{
    AgentMessage, COLOR_VOCAB, EventKind, ProductHypothesis, PurchaseIntent, SagaError, Stage,
    StageEvent,
};

use crate::context::RunContext;
use crate::runner::run_stage;
use crate::saga::Saga;

static QTY_BEFORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(qty|quantity|units?)").expect("valid regex"));
static QTY_AFTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(qty|quantity)\s*[:\-]?\s*(\d+)").expect("valid regex"));
static BARE_INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\b").expect("valid regex"));

static BUDGET_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?:budget|under|below|less than)\s*\$?\s*(\d+(?:\.\d{1,2})?)")
            .expect("valid regex"),
        Regex::new(r"\$\s*(\d+(?:\.\d{1,2})?)").expect("valid regex"),
        Regex::new(r"(\d+(?:\.\d{1,2})?)\s*usd").expect("valid regex"),
    ]
});

const SIZE_VOCAB: &[&str] = &["s", "m", "l", "xl"];

impl Saga {
    /// Run S2: confirm what the shopper wants.
    pub(crate) async fn stage_confirm(&self, ctx: &mut RunContext) -> Result<(), SagaError> {
        let hypothesis = ctx
            .hypothesis
            .clone()
            .ok_or_else(|| SagaError::InvalidInput("intent stage requires a hypothesis".into()))?;
        let user_text = ctx.inputs.user_text.clone();
        let provider = self.config.flags.intent.then(|| self.caps.intent.clone()).flatten();

        let body = async move {
            if let Some(provider) = provider {
                match provider.extract(&hypothesis, user_text.as_deref()).await {
                    Ok(intent) => return Ok(intent),
                    Err(err) => {
                        tracing::warn!(error = %err, "intent provider failed, using grammar");
                    }
                }
            }
            Ok(derive_intent(&hypothesis, user_text.as_deref()))
        };
        let timeout = self.config.timeout(Stage::S2);
        let (intent, dt) = run_stage(ctx, Stage::S2, EventKind::Confirm, timeout, body).await?;

        ctx.record_event(
            StageEvent::succeeded(EventKind::Confirm, dt, ctx.elapsed_ms())
                .with("item", intent.item_name.clone())
                .with("color", intent.color.clone())
                .with("quantity", intent.quantity)
                .with("budget", intent.budget_usd),
        );
        let mut summary = format!("Need {}x {}", intent.quantity, intent.item_name);
        if let Some(color) = &intent.color {
            summary.push_str(&format!(" in {color}"));
        }
        ctx.record_message(
            AgentMessage::new(EventKind::Confirm, "intent", "sourcing", summary, ctx.elapsed_ms())
                .with("budget", intent.budget_usd),
        );
        if ctx.inputs.user_text.as_deref().is_some_and(|t| !t.trim().is_empty()) {
            ctx.record_message(AgentMessage::new(
                EventKind::Confirm,
                "intent",
                "user",
                "Understood your preference.",
                ctx.elapsed_ms(),
            ));
        }
        ctx.intent = Some(intent);
        Ok(())
    }
}

/// Derive a purchase intent from the hypothesis and the raw utterance using
/// the fixed grammar.
pub(crate) fn derive_intent(
    hypothesis: &ProductHypothesis,
    user_text: Option<&str>,
) -> PurchaseIntent {
    let text = user_text.unwrap_or("").to_lowercase().trim().to_string();
    let quantity = extract_quantity(&text);
    let budget_usd = extract_budget(&text);
    let item = hypothesis.display();
    let category = hypothesis.category.clone();
    let brand = hypothesis.brand.clone();

    // Unknown object with no category: choice inference would be noise, so
    // return only what the utterance itself said.
    if hypothesis.is_unknown() && category.is_none() {
        return PurchaseIntent {
            item_name: item,
            color: scan_color(&text),
            size: None,
            quantity,
            budget_usd,
            brand,
            category: None,
        };
    }

    let same_named = text.contains("same") && text.contains(&item.to_lowercase());
    let same_generic = ["same item", "same product", "same one"].iter().any(|p| text.contains(p));
    if same_named || same_generic {
        return PurchaseIntent {
            item_name: item,
            color: hypothesis.color.clone(),
            size: None,
            quantity,
            budget_usd,
            brand,
            category,
        };
    }

    if text.contains("different color") || text.contains("other color") {
        return PurchaseIntent {
            item_name: item,
            color: scan_color_word(&text),
            size: None,
            quantity,
            budget_usd,
            brand,
            category,
        };
    }

    if text.contains("different") && text.contains("same brand") {
        let item_name = match &brand {
            Some(brand) => format!("{brand} {item}"),
            None => item,
        };
        return PurchaseIntent {
            item_name,
            color: None,
            size: None,
            quantity,
            budget_usd,
            brand,
            category,
        };
    }

    let brand = if text.contains("different brand") { None } else { brand };

    let size = SIZE_VOCAB
        .iter()
        .find(|s| format!(" {text} ").contains(&format!(" {s} ")))
        .map(|s| s.to_uppercase());

    PurchaseIntent {
        item_name: item,
        color: scan_color(&text).or_else(|| hypothesis.color.clone()),
        size,
        quantity,
        budget_usd,
        brand,
        category,
    }
}

/// First color found as a substring of the utterance.
fn scan_color(text: &str) -> Option<String> {
    COLOR_VOCAB.iter().find(|c| text.contains(*c)).map(|c| (*c).to_string())
}

/// First color found as a whole word of the utterance.
fn scan_color_word(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split(|c: char| !c.is_ascii_alphanumeric()).collect();
    COLOR_VOCAB.iter().find(|c| words.contains(c)).map(|c| (*c).to_string())
}

/// Quantity grammar: digits before a qty keyword, then a qty keyword before
/// digits, then the first bare integer, else 1.
fn extract_quantity(text: &str) -> u32 {
    if let Some(caps) = QTY_BEFORE_RE.captures(text)
        && let Ok(n) = caps[1].parse()
    {
        return n;
    }
    if let Some(caps) = QTY_AFTER_RE.captures(text)
        && let Ok(n) = caps[2].parse()
    {
        return n;
    }
    if let Some(caps) = BARE_INT_RE.captures(text)
        && let Ok(n) = caps[1].parse()
    {
        return n;
    }
    1
}

/// Budget grammar: "budget/under/below/less than N", then "$N", then "N usd".
fn extract_budget(text: &str) -> Option<f64> {
    for re in BUDGET_RES.iter() {
        if let Some(caps) = re.captures(text)
            && let Ok(amount) = caps[1].parse()
        {
            return Some(amount);
        }
    }
    None
}
