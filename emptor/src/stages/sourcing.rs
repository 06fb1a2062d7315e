//! S3 — offer sourcing.
//!
//! Two strategies run concurrently over the catalog: strict (category,
//! brand, and item-name tokens are all enforced) and fuzzy (progressively
//! looser matching with a whole-catalog fallback). Each strategy scores and
//! shortlists its own candidates, optionally reranked by the LLM provider
//! under the token budgeter, and the union is deduplicated by normalized URL
//! keeping the higher score.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use emptor_budget::{TokenBudgeter, TokenDecision, count_tokens};
use emptor_types::{
    AgentMessage, CatalogItem, CatalogSource, EventKind, Offer, ProviderError, PurchaseIntent,
    RerankProvider, SagaError, Stage, StageEvent, TokenRole, normalize_url,
};

use crate::context::{RunContext, round4};
use crate::runner::run_stage;
use crate::saga::Saga;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrategyKind {
    Strict,
    Fuzzy,
}

pub(crate) struct SourcingOutcome {
    strict_count: usize,
    fuzzy_count: usize,
    offers: Vec<Offer>,
}

impl Saga {
    /// Run S3: source and rank offers for the confirmed intent.
    pub(crate) async fn stage_source(&self, ctx: &mut RunContext) -> Result<(), SagaError> {
        let intent = ctx
            .intent
            .clone()
            .ok_or_else(|| SagaError::InvalidInput("sourcing stage requires an intent".into()))?;
        let catalog = Arc::clone(&self.caps.catalog);
        let reranker = self.config.flags.sourcing.then(|| self.caps.reranker.clone()).flatten();
        let budgeter = Arc::clone(&ctx.budgeter);
        let top_k = self.config.sourcing_top_k;

        let body = async move {
            let strict = run_strategy(
                StrategyKind::Strict,
                &intent,
                &catalog,
                reranker.as_ref(),
                &budgeter,
                top_k,
            );
            let fuzzy = run_strategy(
                StrategyKind::Fuzzy,
                &intent,
                &catalog,
                reranker.as_ref(),
                &budgeter,
                top_k,
            );
            let (strict, fuzzy) = match tokio::join!(strict, fuzzy) {
                (Ok(strict), Ok(fuzzy)) => (strict, fuzzy),
                _ => {
                    // Discard both and take the legacy single path.
                    tracing::warn!("parallel sourcing failed, falling back to single path");
                    let fuzzy = run_strategy(
                        StrategyKind::Fuzzy,
                        &intent,
                        &catalog,
                        reranker.as_ref(),
                        &budgeter,
                        top_k,
                    )
                    .await
                    .map_err(|source| SagaError::Provider { stage: Stage::S3, source })?;
                    (Vec::new(), fuzzy)
                }
            };
            let offers = merge(&strict, &fuzzy);
            Ok(SourcingOutcome { strict_count: strict.len(), fuzzy_count: fuzzy.len(), offers })
        };
        let timeout = self.config.timeout(Stage::S3);
        let (outcome, dt) = run_stage(ctx, Stage::S3, EventKind::Branch, timeout, body).await?;

        ctx.record_event(
            StageEvent::succeeded(EventKind::Branch, dt, ctx.elapsed_ms())
                .with("strict_count", outcome.strict_count)
                .with("fuzzy_count", outcome.fuzzy_count),
        );

        if outcome.offers.is_empty() {
            ctx.record_message(AgentMessage::new(
                EventKind::Sourcing,
                "sourcing",
                "trust",
                "No offers matched the intent.",
                ctx.elapsed_ms(),
            ));
            ctx.record_event(StageEvent::failed(
                EventKind::Sourcing,
                0.0,
                ctx.elapsed_ms(),
                "no_offers",
            ));
            return Err(SagaError::NoOffers);
        }

        let best = pick_best(&outcome.offers, ctx.inputs.preferred_offer_url.as_deref());
        ctx.record_event(
            StageEvent::succeeded(EventKind::Sourcing, 0.0, ctx.elapsed_ms())
                .with("offer_count", outcome.offers.len())
                .with("best_vendor", best.map(|o| o.vendor.clone()))
                .with("best_price", best.map(|o| o.price_usd)),
        );
        if let Some(best) = best {
            ctx.record_message(
                AgentMessage::new(
                    EventKind::Sourcing,
                    "sourcing",
                    "trust",
                    format!("Top candidate {} at ${:.2}", best.vendor, best.price_usd),
                    ctx.elapsed_ms(),
                )
                .with("offer_count", outcome.offers.len()),
            );
        }
        ctx.best_offer = best.cloned();
        ctx.offers = outcome.offers;
        Ok(())
    }
}

async fn run_strategy(
    kind: StrategyKind,
    intent: &PurchaseIntent,
    catalog: &Arc<dyn CatalogSource>,
    reranker: Option<&Arc<dyn RerankProvider>>,
    budgeter: &TokenBudgeter,
    top_k: usize,
) -> Result<Vec<Offer>, ProviderError> {
    let items = catalog.load().await?;
    let candidates = match kind {
        StrategyKind::Strict => filter_strict(intent, &items),
        StrategyKind::Fuzzy => filter_fuzzy(intent, &items),
    };
    let mut shortlist = score_candidates(intent, candidates);
    shortlist.truncate(top_k);
    if shortlist.is_empty() && intent.budget_usd.is_some() {
        shortlist = budget_fallback(intent, &items, top_k);
    }
    if let Some(reranker) = reranker
        && shortlist.len() > 1
    {
        shortlist = rerank_shortlist(intent, shortlist, reranker.as_ref(), budgeter).await;
    }
    Ok(shortlist)
}

/// Strict filter: category equality, brand term, and at least one item-name
/// token are all required when present.
fn filter_strict(intent: &PurchaseIntent, catalog: &[CatalogItem]) -> Vec<CatalogItem> {
    let mut items: Vec<CatalogItem> = match &intent.category {
        Some(category) => catalog
            .iter()
            .filter(|item| item.category.as_deref() == Some(category.as_str()))
            .cloned()
            .collect(),
        None => catalog.to_vec(),
    };
    if let Some(brand) = &intent.brand {
        items.retain(|item| has_term(item, brand));
    }
    let tokens = name_tokens(&intent.item_name);
    if !tokens.is_empty() {
        items.retain(|item| tokens.iter().any(|token| has_term(item, token)));
    }
    items
}

/// Fuzzy filter: intersect category when it helps, then full item-name
/// substring, then any item-name token, keeping the broader set whenever a
/// narrowing step comes up empty.
fn filter_fuzzy(intent: &PurchaseIntent, catalog: &[CatalogItem]) -> Vec<CatalogItem> {
    let mut filtered: Vec<CatalogItem> = catalog.to_vec();
    if let Some(category) = &intent.category {
        let by_category: Vec<CatalogItem> = filtered
            .iter()
            .filter(|item| item.category.as_deref() == Some(category.as_str()))
            .cloned()
            .collect();
        if !by_category.is_empty() {
            filtered = by_category;
        }
    }
    let query = intent.item_name.to_lowercase().trim().to_string();
    if !query.is_empty() {
        let mut matches: Vec<CatalogItem> =
            filtered.iter().filter(|item| has_term(item, &query)).cloned().collect();
        if matches.is_empty() {
            let tokens = name_tokens(&query);
            matches = filtered
                .iter()
                .filter(|item| tokens.iter().any(|token| has_term(item, token)))
                .cloned()
                .collect();
        }
        if !matches.is_empty() {
            filtered = matches;
        }
    }
    filtered
}

/// Whether a term appears in the item title or any keyword (lowercase
/// substring).
fn has_term(item: &CatalogItem, term: &str) -> bool {
    let term = term.to_lowercase();
    if term.is_empty() {
        return false;
    }
    item.title.to_lowercase().contains(&term)
        || item.keywords.iter().any(|keyword| keyword.to_lowercase().contains(&term))
}

/// Item-name tokens long enough to be discriminating.
fn name_tokens(name: &str) -> Vec<String> {
    name.to_lowercase().split_whitespace().filter(|t| t.len() > 2).map(str::to_string).collect()
}

/// Min-max normalize to `[0, 1]`; all-equal inputs map to 0.5.
fn min_max(values: &[f64]) -> Vec<f64> {
    let Some(min) = values.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = values.iter().copied().fold(min, f64::max);
    if (max - min).abs() < 1e-9 {
        return vec![0.5; values.len()];
    }
    values.iter().map(|v| (v - min) / (max - min)).collect()
}

/// Intent-match bonuses added on top of the normalized base score.
fn match_bonus(intent: &PurchaseIntent, item: &CatalogItem) -> f64 {
    let mut bonus = 0.0;
    if let Some(brand) = &intent.brand
        && has_term(item, brand)
    {
        bonus += 0.25;
    }
    if let Some(color) = &intent.color
        && has_term(item, color)
    {
        bonus += 0.15;
    }
    if has_term(item, &intent.item_name) {
        bonus += 0.2;
    }
    if let Some(budget) = intent.budget_usd
        && item.price_usd <= budget
    {
        bonus += 0.1;
    }
    bonus
}

/// Score a candidate set: price, shipping, and ETA are min-max normalized
/// within the set, then weighted 0.6/0.2/0.2 and topped up with match
/// bonuses. Sorted descending.
fn score_candidates(intent: &PurchaseIntent, candidates: Vec<CatalogItem>) -> Vec<Offer> {
    let prices: Vec<f64> = candidates.iter().map(|c| c.price_usd).collect();
    let ships: Vec<f64> = candidates.iter().map(|c| f64::from(c.shipping_days)).collect();
    let etas: Vec<f64> = candidates.iter().map(|c| f64::from(c.eta_days)).collect();
    let price_norm = min_max(&prices);
    let ship_norm = min_max(&ships);
    let eta_norm = min_max(&etas);

    let mut offers: Vec<Offer> = candidates
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let base = 0.6 * (1.0 - price_norm[idx])
                + 0.2 * (1.0 - ship_norm[idx])
                + 0.2 * (1.0 - eta_norm[idx]);
            let score = round4(base + match_bonus(intent, &item));
            Offer::from_item(item, score)
        })
        .collect();
    offers.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    offers
}

/// When a strategy comes up empty and a budget is set: the cheapest catalog
/// items within budget, at a fixed neutral score.
fn budget_fallback(intent: &PurchaseIntent, catalog: &[CatalogItem], top_k: usize) -> Vec<Offer> {
    let Some(budget) = intent.budget_usd else {
        return Vec::new();
    };
    let mut within: Vec<CatalogItem> =
        catalog.iter().filter(|item| item.price_usd <= budget).cloned().collect();
    within.sort_by(|a, b| a.price_usd.partial_cmp(&b.price_usd).unwrap_or(Ordering::Equal));
    within.into_iter().take(top_k).map(|item| Offer::from_item(item, 0.5)).collect()
}

/// Run the LLM reranker over a shortlist under the token budgeter. Every
/// refusal or failure keeps the deterministic order.
async fn rerank_shortlist(
    intent: &PurchaseIntent,
    offers: Vec<Offer>,
    reranker: &dyn RerankProvider,
    budgeter: &TokenBudgeter,
) -> Vec<Offer> {
    let model = reranker.model().to_string();
    let enriched: Vec<serde_json::Value> = offers
        .iter()
        .enumerate()
        .map(|(index, offer)| {
            serde_json::json!({
                "index": index,
                "vendor": offer.vendor,
                "title": offer.title,
                "price_usd": offer.price_usd,
                "shipping_days": offer.shipping_days,
                "eta_days": offer.eta_days,
                "category": offer.category,
                "keywords": offer.keywords,
            })
        })
        .collect();
    let payload = serde_json::json!({ "intent": intent, "offers": enriched }).to_string();
    let planned = count_tokens(&model, &payload);

    let mut max_output = None;
    match budgeter.enforce_before_call(Stage::S3, planned) {
        TokenDecision::Ok => {}
        TokenDecision::Warn => {
            tracing::warn!(planned, "token budget exceeded, warn policy lets the call through");
        }
        TokenDecision::Truncate { max_output_tokens } => max_output = Some(max_output_tokens),
        TokenDecision::Fallback => {
            budgeter.charge(Stage::S3, "llm", &model, TokenRole::Prompt, 0);
            return offers;
        }
        TokenDecision::Block => {
            // Record the refused charge so the audit trail shows why the
            // rerank never ran, then fall back.
            budgeter.charge(Stage::S3, "llm", &model, TokenRole::Prompt, planned);
            tracing::warn!(planned, "token budget block, keeping deterministic order");
            return offers;
        }
    }
    budgeter.charge(Stage::S3, "llm", &model, TokenRole::Prompt, planned);
    match reranker.rerank(intent, &offers, max_output).await {
        Ok(indices) => {
            let completion = serde_json::to_string(&indices)
                .map(|text| count_tokens(&model, &text))
                .unwrap_or(0);
            budgeter.charge(Stage::S3, "llm", &model, TokenRole::Completion, completion);
            apply_ranking(offers, &indices)
        }
        Err(err) => {
            tracing::warn!(error = %err, "rerank failed, keeping deterministic order");
            offers
        }
    }
}

/// Reorder `offers` by the provider's indices: out-of-range entries are
/// dropped, duplicates keep the first occurrence, missing indices are
/// appended in original order.
fn apply_ranking(offers: Vec<Offer>, indices: &[usize]) -> Vec<Offer> {
    let mut order: Vec<usize> = Vec::with_capacity(offers.len());
    let mut seen = vec![false; offers.len()];
    for &index in indices {
        if index < offers.len() && !seen[index] {
            seen[index] = true;
            order.push(index);
        }
    }
    for (index, taken) in seen.iter().enumerate() {
        if !taken {
            order.push(index);
        }
    }
    let mut slots: Vec<Option<Offer>> = offers.into_iter().map(Some).collect();
    order.into_iter().filter_map(|index| slots[index].take()).collect()
}

/// Dedup the union by normalized URL, keeping the higher score per URL, and
/// sort descending by score.
fn merge(strict: &[Offer], fuzzy: &[Offer]) -> Vec<Offer> {
    let mut merged: BTreeMap<String, Offer> = BTreeMap::new();
    for offer in strict.iter().chain(fuzzy.iter()) {
        let key = offer.normalized_url();
        match merged.get(&key) {
            Some(existing) if existing.score >= offer.score => {}
            _ => {
                merged.insert(key, offer.clone());
            }
        }
    }
    let mut offers: Vec<Offer> = merged.into_values().collect();
    offers.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    offers
}

/// The preferred offer when its normalized URL survives the merge, else the
/// top-scored offer.
fn pick_best<'a>(offers: &'a [Offer], preferred_url: Option<&str>) -> Option<&'a Offer> {
    if let Some(preferred) = preferred_url {
        let target = normalize_url(preferred);
        if let Some(hit) = offers.iter().find(|offer| offer.normalized_url() == target) {
            return Some(hit);
        }
    }
    offers.first()
}
