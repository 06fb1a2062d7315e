//! S4 — trust assessment and bounded compensation.
//!
//! Rule-based vendor scoring, robust anomaly z-scores against the price
//! reference store, vision cross-checks, and a replica-vocabulary scan feed
//! one [`TrustAssessment`]. If the final band is medium or high, a bounded
//! sequential search tries to switch to a strictly safer offer inside a
//! price window and a latency cap.

use std::sync::Arc;
use std::time::Instant;

use emptor_types::{
    AgentMessage, EventKind, Offer, PriceRefSource, ProductHypothesis, RiskBand, SagaError, Stage,
    StageEvent, TrustAdjuster, TrustAssessment, VendorProfile,
};

use crate::config::ResolvedCompensation;
use crate::context::{RunContext, round2, round4};
use crate::runner::run_stage;
use crate::saga::Saga;

/// Terms whose presence in listing text forces the risk band to high.
const REPLICA_TERMS: &[&str] = &[
    "replica",
    "knockoff",
    "fake",
    "dupe",
    "inspired",
    "lookalike",
    "mirror quality",
    "aaa",
    "copy",
    "compatible with",
    "style",
];

const SUSPICIOUS_VENDOR_TERMS: &[&str] = &["scam", "fraud", "unknown", "dealz", "click"];
const SUSPICIOUS_URL_TERMS: &[&str] = &["scam", "click", "malware", "unknown"];

/// Reputation records for the known marketplace vendors.
fn vendor_profile(vendor: &str) -> VendorProfile {
    match vendor {
        "Mockazon" => VendorProfile {
            tls: true,
            domain_age_days: 2400,
            has_policy_pages: true,
            historical_issues: false,
            happy_reviews_pct: 0.92,
            accepts_returns: true,
            average_refund_time_days: 5,
        },
        "Shoply" => VendorProfile {
            tls: true,
            domain_age_days: 1100,
            has_policy_pages: true,
            historical_issues: false,
            happy_reviews_pct: 0.88,
            accepts_returns: true,
            average_refund_time_days: 7,
        },
        "SuperMart" => VendorProfile {
            tls: true,
            domain_age_days: 3200,
            has_policy_pages: true,
            historical_issues: false,
            happy_reviews_pct: 0.85,
            accepts_returns: true,
            average_refund_time_days: 6,
        },
        "MegaBuy" => VendorProfile {
            tls: true,
            domain_age_days: 650,
            has_policy_pages: true,
            historical_issues: false,
            happy_reviews_pct: 0.81,
            accepts_returns: true,
            average_refund_time_days: 8,
        },
        "GigaDeal" => VendorProfile {
            tls: true,
            domain_age_days: 120,
            has_policy_pages: false,
            historical_issues: true,
            happy_reviews_pct: 0.64,
            accepts_returns: false,
            average_refund_time_days: 14,
        },
        _ => VendorProfile::pessimistic(),
    }
}

/// Additive rule score over the vendor profile and listing, mapped to a
/// band: `<= 1` low, `<= 3.5` medium, else high.
fn profile_risk(profile: &VendorProfile, offer: &Offer) -> RiskBand {
    let mut score = 0.0;

    if !profile.tls {
        score += 2.0;
    }
    if !profile.has_policy_pages {
        score += 1.0;
    }
    if profile.domain_age_days < 365 {
        score += 1.0;
    }
    if profile.domain_age_days < 90 {
        score += 1.0;
    }

    if profile.historical_issues {
        score += 2.0;
    }
    if profile.happy_reviews_pct < 0.75 {
        score += 1.0;
    }
    if profile.happy_reviews_pct < 0.6 {
        score += 1.0;
    }

    if !profile.accepts_returns {
        score += 2.0;
    } else if profile.average_refund_time_days > 14 {
        score += 1.0;
    } else if profile.average_refund_time_days > 10 {
        score += 0.5;
    }

    let vendor = offer.vendor.to_lowercase();
    let url = offer.url.to_lowercase();
    if SUSPICIOUS_VENDOR_TERMS.iter().any(|t| vendor.contains(t))
        || SUSPICIOUS_URL_TERMS.iter().any(|t| url.contains(t))
    {
        score += 2.0;
    }

    if score <= 1.0 {
        RiskBand::Low
    } else if score <= 3.5 {
        RiskBand::Medium
    } else {
        RiskBand::High
    }
}

/// Brand heuristic for reference lookups: the first title token.
fn brand_from_title(title: &str) -> Option<String> {
    let token = title.split_whitespace().next()?.trim_matches(['-', '_']);
    if token.is_empty() { None } else { Some(token.to_lowercase()) }
}

/// Numeric attribute reader tolerating both numbers and numeric strings.
fn numeric_attribute(offer: &Offer, name: &str) -> Option<f64> {
    match offer.attributes.get(name)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The evaluator bundles the optional providers and config slices the trust
/// rules need, so compensation can re-run the full evaluation per candidate.
pub(crate) struct TrustEvaluator {
    pub(crate) price_refs: Option<Arc<dyn PriceRefSource>>,
    pub(crate) adjuster: Option<Arc<dyn TrustAdjuster>>,
    pub(crate) marketplace_prefix: String,
}

impl TrustEvaluator {
    /// Full trust evaluation for one offer: profile rules, anomaly
    /// enrichment, optional LLM adjustment, vision cross-checks, replica
    /// scan.
    pub(crate) async fn evaluate(
        &self,
        offer: &Offer,
        hypothesis: Option<&ProductHypothesis>,
    ) -> TrustAssessment {
        let profile = vendor_profile(&offer.vendor);
        let risk = profile_risk(&profile, offer);
        let mut assessment = TrustAssessment::from_profile(&offer.vendor, &profile, risk);

        self.apply_anomalies(offer, &mut assessment).await;

        if let Some(adjuster) = &self.adjuster {
            match adjuster.adjust(offer, assessment.clone(), &profile).await {
                Ok(adjusted) => assessment = adjusted,
                Err(err) => {
                    tracing::warn!(error = %err, "trust adjustment failed, keeping rule-based assessment");
                }
            }
        }

        self.apply_cross_checks(offer, hypothesis, &mut assessment);
        assessment
    }

    /// Robust z-scores for price, weight, and linear dimensions, with band
    /// raises at the configured thresholds.
    async fn apply_anomalies(&self, offer: &Offer, assessment: &mut TrustAssessment) {
        let Some(price_refs) = &self.price_refs else {
            return;
        };
        let brand = brand_from_title(&offer.title);
        let refs = match price_refs.lookup(brand.as_deref(), offer.category.as_deref()).await {
            Ok(Some(refs)) => refs,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "price reference lookup failed");
                return;
            }
        };
        let zscore = |metric: &str, value: f64| {
            refs.get(metric).map(|stats| {
                let spread = if stats.spread == 0.0 { 1.0 } else { stats.spread };
                (value - stats.median) / spread
            })
        };

        if let Some(z) = zscore("price", offer.price_usd) {
            assessment.price_zscore = Some(z);
            if z <= -2.0 {
                assessment.risk = assessment.risk.raise(RiskBand::High);
            }
        }
        if let Some(z) = numeric_attribute(offer, "weight").and_then(|w| zscore("weight", w)) {
            assessment.weight_zscore = Some(z);
            if z.abs() >= 3.0 {
                assessment.risk = assessment.risk.raise(RiskBand::High);
            }
        }
        for metric in ["height", "width", "length"] {
            if let Some(z) = numeric_attribute(offer, metric).and_then(|v| zscore(metric, v)) {
                assessment.dimension_zscores.insert(metric.to_string(), z);
            }
        }
        if assessment.dimension_zscores.values().any(|z| z.abs() >= 3.0) {
            assessment.risk = assessment.risk.raise(RiskBand::Medium);
        }
    }

    /// Cross-checks against the vision hypothesis plus the replica scan.
    fn apply_cross_checks(
        &self,
        offer: &Offer,
        hypothesis: Option<&ProductHypothesis>,
        assessment: &mut TrustAssessment,
    ) {
        let domain_name = offer
            .attributes
            .get("domain_name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_lowercase();
        if !domain_name.is_empty() && !domain_name.starts_with(&self.marketplace_prefix) {
            assessment.domain_mismatch = true;
            assessment
                .auth_reasons
                .push(format!("Domain is not {} marketplace", article(&self.marketplace_prefix)));
        }

        // The detected brand must show up somewhere on the listing: vendor
        // name, title, or keywords. Marketplace vendors sell many brands, so
        // the vendor name alone is not authoritative.
        let vision_brand = hypothesis.and_then(|h| h.brand.as_deref()).map(str::to_lowercase);
        let listing = format!("{} {} {}", offer.vendor, offer.title, offer.keywords.join(" "))
            .to_lowercase();
        let brand_mismatch = matches!(
            &vision_brand,
            Some(brand) if !brand.is_empty() && !listing.contains(brand)
        );
        if brand_mismatch {
            assessment.brand_mismatch = true;
            assessment.auth_reasons.push("Vision brand differs from listing".to_string());
        }

        let mut color_mismatch = false;
        if let Some(color) = hypothesis.and_then(|h| h.color.as_deref()) {
            let color = color.to_lowercase();
            let blob = format!("{} {}", offer.title, offer.description.as_deref().unwrap_or(""))
                .to_lowercase();
            if !color.is_empty() && !blob.contains(&color) {
                color_mismatch = true;
                assessment.auth_reasons.push("Vision color not present in listing".to_string());
            }
        }
        assessment.vision_mismatch = brand_mismatch || color_mismatch;

        let text_blob = format!(
            "{} {} {}",
            offer.title,
            offer.description.as_deref().unwrap_or(""),
            offer.keywords.join(" ")
        )
        .to_lowercase();
        let mut hits: Vec<String> = REPLICA_TERMS
            .iter()
            .filter(|term| text_blob.contains(*term))
            .map(|term| (*term).to_string())
            .collect();
        hits.sort();
        hits.dedup();
        if !hits.is_empty() {
            assessment.auth_reasons.push(format!("Replica cues: {}", hits.join(", ")));
            assessment.replica_terms = hits;
        }

        if !assessment.replica_terms.is_empty() {
            assessment.risk = assessment.risk.raise(RiskBand::High);
        }
        if assessment.domain_mismatch {
            assessment.risk = assessment.risk.raise(RiskBand::Medium);
        }
        if assessment.vision_mismatch {
            assessment.risk = assessment.risk.raise(RiskBand::Medium);
        }
    }
}

/// "an amazon" vs "a shoply" for the domain-mismatch reason string.
fn article(prefix: &str) -> String {
    match prefix.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => format!("an {prefix}"),
        _ => format!("a {prefix}"),
    }
}

/// One compensation candidate evaluation, recorded as an `S4_COMPENSATE`
/// event.
struct CompensationAttempt {
    dt_s: f64,
    vendor: String,
    risk: RiskBand,
    price_delta_pct: Option<f64>,
    switched: bool,
}

struct TrustOutcome {
    trust_dt: f64,
    /// Assessment of the originally selected best offer, as recorded in the
    /// `S4_TRUST` event even when compensation later switches.
    initial: TrustAssessment,
    /// The authoritative assessment after any switch.
    trust: TrustAssessment,
    attempts: Vec<CompensationAttempt>,
    best: Offer,
}

impl Saga {
    pub(crate) fn trust_evaluator(&self) -> TrustEvaluator {
        TrustEvaluator {
            price_refs: self.caps.price_refs.clone(),
            adjuster: self.config.flags.trust.then(|| self.caps.trust_adjuster.clone()).flatten(),
            marketplace_prefix: self.config.marketplace_prefix.to_lowercase(),
        }
    }

    /// Run S4: assess the best offer, compensating onto a strictly safer
    /// alternative when the verdict is medium or high.
    pub(crate) async fn stage_trust(&self, ctx: &mut RunContext) -> Result<(), SagaError> {
        let Some(best) = ctx.best_offer.clone() else {
            // Soft failure: nothing to assess, downstream short-circuits.
            ctx.record_event(StageEvent::failed(EventKind::Trust, 0.0, ctx.elapsed_ms(), "no_offer"));
            ctx.record_message(AgentMessage::new(
                EventKind::Trust,
                "trust",
                "checkout",
                "No offer available for trust evaluation.",
                ctx.elapsed_ms(),
            ));
            return Ok(());
        };

        let evaluator = self.trust_evaluator();
        let hypothesis = ctx.hypothesis.clone();
        let offers = ctx.offers.clone();
        let comp = ctx.comp;

        let body = async move {
            let trust_started = Instant::now();
            let trust = evaluator.evaluate(&best, hypothesis.as_ref()).await;
            let trust_dt = round4(trust_started.elapsed().as_secs_f64());

            let mut outcome = TrustOutcome {
                trust_dt,
                initial: trust.clone(),
                trust,
                attempts: Vec::new(),
                best: best.clone(),
            };
            if outcome.trust.risk >= RiskBand::Medium && offers.len() > 1 {
                compensate(&evaluator, hypothesis.as_ref(), &offers, comp, &mut outcome).await;
            }
            Ok(outcome)
        };
        let timeout = self.config.timeout(Stage::S4);
        let (outcome, _dt) = run_stage(ctx, Stage::S4, EventKind::Trust, timeout, body).await?;

        ctx.record_event(
            StageEvent::succeeded(EventKind::Trust, outcome.trust_dt, ctx.elapsed_ms())
                .with("vendor", outcome.initial.vendor.clone())
                .with("risk", outcome.initial.risk.as_str()),
        );
        ctx.record_message(
            AgentMessage::new(
                EventKind::Trust,
                "trust",
                "checkout",
                format!("{} evaluated as {}", outcome.initial.vendor, outcome.initial.risk),
                ctx.elapsed_ms(),
            )
            .with("price_z", outcome.initial.price_zscore),
        );
        if !outcome.initial.replica_terms.is_empty() {
            ctx.record_message(
                AgentMessage::new(
                    EventKind::Trust,
                    "trust",
                    "sourcing",
                    "Replica cues detected",
                    ctx.elapsed_ms(),
                )
                .with("details", outcome.initial.replica_terms.join(", ")),
            );
        }
        for attempt in &outcome.attempts {
            ctx.record_event(
                StageEvent::succeeded(EventKind::Compensate, attempt.dt_s, ctx.elapsed_ms())
                    .with("candidate_vendor", attempt.vendor.clone())
                    .with("candidate_risk", attempt.risk.as_str())
                    .with("price_delta_pct", attempt.price_delta_pct)
                    .with("switched", attempt.switched),
            );
            if attempt.switched {
                ctx.record_message(
                    AgentMessage::new(
                        EventKind::Trust,
                        "trust",
                        "sourcing",
                        format!("Switched to {} due to lower risk", attempt.vendor),
                        ctx.elapsed_ms(),
                    )
                    .with("candidate_risk", attempt.risk.as_str()),
                );
            }
        }

        // The winning offer leads the list so downstream consumers can rely
        // on the ordering.
        if ctx.offers.first().map(|o| o.url.as_str()) != Some(outcome.best.url.as_str()) {
            let best_url = outcome.best.url.clone();
            let mut reordered = vec![outcome.best.clone()];
            reordered.extend(ctx.offers.iter().filter(|o| o.url != best_url).cloned());
            ctx.offers = reordered;
        }
        ctx.best_offer = Some(outcome.best);
        ctx.trust = Some(outcome.trust);
        Ok(())
    }
}

/// Sequentially try up to `comp.top_k` alternatives inside the price window
/// and the latency cap; first strictly-safer candidate wins.
async fn compensate(
    evaluator: &TrustEvaluator,
    hypothesis: Option<&ProductHypothesis>,
    offers: &[Offer],
    comp: ResolvedCompensation,
    outcome: &mut TrustOutcome,
) {
    let started = Instant::now();
    let baseline = outcome.best.price_usd;
    let mut attempts = 0;

    for candidate in offers {
        if attempts >= comp.top_k {
            break;
        }
        if candidate.url == outcome.best.url {
            continue;
        }
        if started.elapsed() > comp.extra_latency {
            tracing::debug!(attempts, "compensation latency cap reached");
            break;
        }

        let price_delta_pct = if baseline > 0.0 {
            Some(100.0 * (candidate.price_usd - baseline) / baseline)
        } else {
            None
        };
        let price_ok = match price_delta_pct {
            Some(delta) if comp.price_window_pct >= 0.0 => delta <= comp.price_window_pct,
            _ => true,
        };

        let attempt_started = Instant::now();
        let candidate_trust = evaluator.evaluate(candidate, hypothesis).await;
        let safer = candidate_trust.risk < outcome.trust.risk;
        let switched = safer && price_ok;
        outcome.attempts.push(CompensationAttempt {
            dt_s: round4(attempt_started.elapsed().as_secs_f64()),
            vendor: candidate.vendor.clone(),
            risk: candidate_trust.risk,
            price_delta_pct: price_delta_pct.map(round2),
            switched,
        });
        attempts += 1;
        if switched {
            outcome.best = candidate.clone();
            outcome.trust = candidate_trust;
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn offer(vendor: &str, title: &str, price: f64, url: &str) -> Offer {
        Offer {
            vendor: vendor.to_string(),
            title: title.to_string(),
            price_usd: price,
            shipping_days: 3,
            eta_days: 6,
            url: url.to_string(),
            score: 0.5,
            category: Some("drinkware".to_string()),
            keywords: Vec::new(),
            description: None,
            image_url: None,
            attributes: BTreeMap::new(),
        }
    }

    fn evaluator() -> TrustEvaluator {
        TrustEvaluator {
            price_refs: None,
            adjuster: None,
            marketplace_prefix: "amazon".to_string(),
        }
    }

    #[test]
    fn known_good_vendor_scores_low() {
        let offer = offer("Mockazon", "Nike Water Bottle Blue", 24.99, "https://m.example/1");
        let profile = vendor_profile("Mockazon");
        assert_eq!(profile_risk(&profile, &offer), RiskBand::Low);
    }

    #[test]
    fn gigadeal_profile_scores_high() {
        // no policy (+1), young domain (+1), issues (+2), reviews < 0.75
        // (+1), no returns (+2) = 7
        let offer = offer("GigaDeal", "Water Bottle", 12.0, "https://g.example/1");
        let profile = vendor_profile("GigaDeal");
        assert_eq!(profile_risk(&profile, &offer), RiskBand::High);
    }

    #[test]
    fn unknown_vendor_is_pessimistic() {
        let offer = offer("RandomShop", "Water Bottle", 20.0, "https://r.example/1");
        let profile = vendor_profile("RandomShop");
        assert_eq!(profile_risk(&profile, &offer), RiskBand::High);
    }

    #[test]
    fn suspicious_name_or_url_adds_weight() {
        // Shoply profile alone is low; a suspicious URL pushes it to medium.
        let offer = offer("Shoply", "Water Bottle", 20.0, "https://click-bait.example/1");
        let profile = vendor_profile("Shoply");
        assert_eq!(profile_risk(&profile, &offer), RiskBand::Medium);
    }

    #[tokio::test]
    async fn replica_terms_force_high() {
        let offer = offer(
            "Mockazon",
            "Water Bottle inspired by Nike style",
            24.99,
            "https://m.example/1",
        );
        let trust = evaluator().evaluate(&offer, None).await;
        assert_eq!(trust.risk, RiskBand::High);
        assert_eq!(trust.replica_terms, vec!["inspired".to_string(), "style".to_string()]);
        assert!(trust.auth_reasons.iter().any(|r| r.starts_with("Replica cues:")));
    }

    #[tokio::test]
    async fn brand_mismatch_raises_to_medium() {
        let hypo = ProductHypothesis {
            brand: Some("Nike".to_string()),
            ..ProductHypothesis::unknown()
        };
        let offer = offer("Mockazon", "Water Bottle", 24.99, "https://m.example/1");
        let trust = evaluator().evaluate(&offer, Some(&hypo)).await;
        assert!(trust.brand_mismatch);
        assert!(trust.vision_mismatch);
        assert_eq!(trust.risk, RiskBand::Medium);
    }

    #[tokio::test]
    async fn brand_on_the_listing_is_not_a_mismatch() {
        let hypo = ProductHypothesis {
            brand: Some("Nike".to_string()),
            ..ProductHypothesis::unknown()
        };
        let offer = offer("Mockazon", "Nike Water Bottle", 24.99, "https://m.example/1");
        let trust = evaluator().evaluate(&offer, Some(&hypo)).await;
        assert!(!trust.brand_mismatch);
        assert_eq!(trust.risk, RiskBand::Low);
    }

    #[tokio::test]
    async fn color_mismatch_raises_to_medium() {
        let hypo = ProductHypothesis {
            color: Some("blue".to_string()),
            ..ProductHypothesis::unknown()
        };
        let offer = offer("Mockazon", "Water Bottle Red", 24.99, "https://m.example/1");
        let trust = evaluator().evaluate(&offer, Some(&hypo)).await;
        assert!(!trust.brand_mismatch);
        assert!(trust.vision_mismatch);
        assert_eq!(trust.risk, RiskBand::Medium);
    }

    #[tokio::test]
    async fn domain_mismatch_raises_to_medium() {
        let mut o = offer("Mockazon", "Water Bottle", 24.99, "https://m.example/1");
        o.attributes.insert("domain_name".to_string(), "gigadeal.biz".into());
        let trust = evaluator().evaluate(&o, None).await;
        assert!(trust.domain_mismatch);
        assert_eq!(trust.risk, RiskBand::Medium);
    }

    #[tokio::test]
    async fn compensation_switches_to_strictly_safer_candidate() {
        let risky = offer("GigaDeal", "Water Bottle", 20.0, "https://g.example/1");
        let safe = offer("Shoply", "Water Bottle", 21.0, "https://s.example/1");
        let offers = vec![risky.clone(), safe.clone()];
        let evaluator = evaluator();
        let trust = evaluator.evaluate(&risky, None).await;
        let mut outcome =
            TrustOutcome {
                trust_dt: 0.0,
                initial: trust.clone(),
                trust,
                attempts: Vec::new(),
                best: risky.clone(),
            };
        let comp = ResolvedCompensation {
            top_k: 3,
            price_window_pct: 10.0,
            extra_latency: Duration::from_millis(500),
        };
        compensate(&evaluator, None, &offers, comp, &mut outcome).await;
        assert_eq!(outcome.best.vendor, "Shoply");
        assert_eq!(outcome.trust.risk, RiskBand::Low);
        assert_eq!(outcome.attempts.len(), 1);
        assert!(outcome.attempts[0].switched);
        assert_eq!(outcome.attempts[0].price_delta_pct, Some(5.0));
    }

    #[tokio::test]
    async fn compensation_respects_the_price_window() {
        let risky = offer("GigaDeal", "Water Bottle", 20.0, "https://g.example/1");
        let pricey_safe = offer("Shoply", "Water Bottle", 23.0, "https://s.example/1");
        let offers = vec![risky.clone(), pricey_safe];
        let evaluator = evaluator();
        let trust = evaluator.evaluate(&risky, None).await;
        let mut outcome =
            TrustOutcome {
                trust_dt: 0.0,
                initial: trust.clone(),
                trust,
                attempts: Vec::new(),
                best: risky.clone(),
            };
        let comp = ResolvedCompensation {
            top_k: 3,
            price_window_pct: 10.0,
            extra_latency: Duration::from_millis(500),
        };
        compensate(&evaluator, None, &offers, comp, &mut outcome).await;
        // 15% over baseline: evaluated but not switched
        assert_eq!(outcome.best.vendor, "GigaDeal");
        assert_eq!(outcome.attempts.len(), 1);
        assert!(!outcome.attempts[0].switched);
    }

    #[tokio::test]
    async fn compensation_is_bounded_by_top_k() {
        let risky = offer("GigaDeal", "Water Bottle", 20.0, "https://g.example/0");
        let mut offers = vec![risky.clone()];
        for i in 1..=5 {
            // All alternatives are unknown vendors (high risk): never safer.
            offers.push(offer("NoName", "Water Bottle", 20.0, &format!("https://n.example/{i}")));
        }
        let evaluator = evaluator();
        let trust = evaluator.evaluate(&risky, None).await;
        let mut outcome =
            TrustOutcome {
                trust_dt: 0.0,
                initial: trust.clone(),
                trust,
                attempts: Vec::new(),
                best: risky.clone(),
            };
        let comp = ResolvedCompensation {
            top_k: 3,
            price_window_pct: 10.0,
            extra_latency: Duration::from_secs(5),
        };
        compensate(&evaluator, None, &offers, comp, &mut outcome).await;
        assert_eq!(outcome.attempts.len(), 3);
        assert!(outcome.attempts.iter().all(|a| !a.switched));
        assert_eq!(outcome.best.vendor, "GigaDeal");
    }
}
