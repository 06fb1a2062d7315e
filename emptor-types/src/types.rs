//! Core domain types for the purchase saga.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed color vocabulary shared by the vision heuristics and the intent
/// grammar. Matching is substring-based on lowercase text.
pub const COLOR_VOCAB: &[&str] = &[
    "black", "white", "blue", "red", "green", "yellow", "pink", "purple", "grey", "gray", "orange",
    "silver", "gold",
];

/// Ordered risk band assigned by trust evaluation.
///
/// The total order `Low < Medium < High` is load-bearing: compensation
/// switches only to a *strictly* lower band, and [`RiskBand::raise`] is the
/// max operator over this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    /// Safe to check out without compensation.
    Low,
    /// Triggers compensation search.
    Medium,
    /// Triggers compensation search; never lowered by further signals.
    High,
}

impl RiskBand {
    /// Raise the band to at least `target`. Monotonic: never lowers.
    #[must_use]
    pub fn raise(self, target: RiskBand) -> RiskBand {
        self.max(target)
    }

    /// The lowercase wire form of the band.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel-space bounding box reported by a vision provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x1: i32,
    /// Top edge.
    pub y1: i32,
    /// Right edge.
    pub x2: i32,
    /// Bottom edge.
    pub y2: i32,
}

/// What the vision stage believes is in the image.
///
/// A provider that cannot recognize the object returns the low-confidence
/// `label = "object"` hypothesis; the pipeline continues and the intent
/// grammar falls back to parsed fields only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductHypothesis {
    /// Detected object label (e.g. "bottle"); `"object"` when unrecognized.
    pub label: String,
    /// Detected brand, if any.
    #[serde(default)]
    pub brand: Option<String>,
    /// Dominant color name from the fixed vocabulary.
    #[serde(default)]
    pub color: Option<String>,
    /// Detection box, if the provider localizes.
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
    /// Catalog category the label maps to.
    #[serde(default)]
    pub category: Option<String>,
    /// Human-facing name (e.g. "water bottle" for label "bottle").
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ProductHypothesis {
    /// The hypothesis used when nothing was recognized.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            label: "object".to_string(),
            brand: None,
            color: None,
            bbox: None,
            confidence: 0.75,
            category: None,
            display_name: None,
        }
    }

    /// Whether this is the unrecognized-object hypothesis.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.label.eq_ignore_ascii_case("object")
    }

    /// Human-facing item name: display name, else label, else "item".
    #[must_use]
    pub fn display(&self) -> String {
        let name = self
            .display_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(self.label.as_str());
        let name = name.trim();
        if name.is_empty() { "item".to_string() } else { name.to_string() }
    }
}

/// What the shopper wants, confirmed against the hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseIntent {
    /// The item being sought.
    pub item_name: String,
    /// Requested color, if any.
    #[serde(default)]
    pub color: Option<String>,
    /// Requested size (uppercased S/M/L/XL), if any.
    #[serde(default)]
    pub size: Option<String>,
    /// Requested quantity, at least 1.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Budget ceiling in USD, if any.
    #[serde(default)]
    pub budget_usd: Option<f64>,
    /// Requested brand, if any.
    #[serde(default)]
    pub brand: Option<String>,
    /// Catalog category constraint, if any.
    #[serde(default)]
    pub category: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl PurchaseIntent {
    /// Create an intent for `item_name` with all optional fields unset
    /// and quantity 1.
    #[must_use]
    pub fn new(item_name: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            color: None,
            size: None,
            quantity: 1,
            budget_usd: None,
            brand: None,
            category: None,
        }
    }
}

/// A raw catalog record before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Selling vendor.
    pub vendor: String,
    /// Listing title.
    pub title: String,
    /// Listing price in USD.
    pub price_usd: f64,
    /// Days until the vendor ships.
    pub shipping_days: u32,
    /// Days until estimated arrival.
    pub eta_days: u32,
    /// Listing URL; the canonical dedup identifier.
    pub url: String,
    /// Catalog category.
    #[serde(default)]
    pub category: Option<String>,
    /// Search keywords attached to the listing.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Listing description.
    #[serde(default)]
    pub description: Option<String>,
    /// Listing image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Free-form listing attributes (domain_name, weight, dimensions, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// A scored, rankable offer produced by the sourcing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// Selling vendor.
    pub vendor: String,
    /// Listing title.
    pub title: String,
    /// Listing price in USD; always positive.
    pub price_usd: f64,
    /// Days until the vendor ships.
    pub shipping_days: u32,
    /// Days until estimated arrival.
    pub eta_days: u32,
    /// Listing URL; the canonical dedup identifier.
    pub url: String,
    /// Ranking score; higher is better.
    pub score: f64,
    /// Catalog category.
    #[serde(default)]
    pub category: Option<String>,
    /// Search keywords attached to the listing.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Listing description.
    #[serde(default)]
    pub description: Option<String>,
    /// Listing image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Free-form listing attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Offer {
    /// Build an offer from a catalog item and a ranking score.
    #[must_use]
    pub fn from_item(item: CatalogItem, score: f64) -> Self {
        Self {
            vendor: item.vendor,
            title: item.title,
            price_usd: item.price_usd,
            shipping_days: item.shipping_days,
            eta_days: item.eta_days,
            url: item.url,
            score,
            category: item.category,
            keywords: item.keywords,
            description: item.description,
            image_url: item.image_url,
            attributes: item.attributes,
        }
    }

    /// The URL in its dedup-canonical form.
    #[must_use]
    pub fn normalized_url(&self) -> String {
        normalize_url(&self.url)
    }
}

/// Canonicalize a URL for deduplication: strip trailing slashes, lowercase.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_ascii_lowercase()
}

/// Static reputation facts about a vendor, consumed by trust scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorProfile {
    /// Whether the storefront serves TLS.
    pub tls: bool,
    /// Age of the vendor domain in days.
    pub domain_age_days: u32,
    /// Whether returns/privacy policy pages exist.
    pub has_policy_pages: bool,
    /// Whether past fraud or dispute issues are on record.
    pub historical_issues: bool,
    /// Fraction of reviews rated positive, in `[0, 1]`.
    pub happy_reviews_pct: f64,
    /// Whether the vendor accepts returns at all.
    pub accepts_returns: bool,
    /// Average days until a refund lands.
    pub average_refund_time_days: u32,
}

impl VendorProfile {
    /// The profile assumed for vendors with no reputation record.
    /// Deliberately pessimistic.
    #[must_use]
    pub fn pessimistic() -> Self {
        Self {
            tls: false,
            domain_age_days: 45,
            has_policy_pages: false,
            historical_issues: true,
            happy_reviews_pct: 0.5,
            accepts_returns: false,
            average_refund_time_days: 21,
        }
    }
}

/// The trust verdict for one offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustAssessment {
    /// Vendor being assessed.
    pub vendor: String,
    /// Profile echo: TLS present.
    pub tls: bool,
    /// Profile echo: domain age in days.
    pub domain_age_days: u32,
    /// Profile echo: policy pages present.
    pub has_policy_pages: bool,
    /// The risk band; only ever raised after initial scoring.
    pub risk: RiskBand,
    /// Profile echo: positive review fraction.
    #[serde(default)]
    pub happy_reviews_pct: Option<f64>,
    /// Profile echo: returns accepted.
    #[serde(default)]
    pub accepts_returns: Option<bool>,
    /// Profile echo: average refund days.
    #[serde(default)]
    pub average_refund_time_days: Option<u32>,
    /// Profile echo: past issues on record.
    #[serde(default)]
    pub historical_issues: Option<bool>,
    /// Human-readable findings accumulated during evaluation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auth_reasons: Vec<String>,
    /// Robust price z-score against the reference store.
    #[serde(default)]
    pub price_zscore: Option<f64>,
    /// Robust weight z-score against the reference store.
    #[serde(default)]
    pub weight_zscore: Option<f64>,
    /// Robust z-scores for linear dimensions, keyed by metric name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dimension_zscores: BTreeMap<String, f64>,
    /// Vision brand does not appear in the vendor name.
    #[serde(default)]
    pub brand_mismatch: bool,
    /// Listing domain is not the configured marketplace.
    #[serde(default)]
    pub domain_mismatch: bool,
    /// Any vision cross-check (brand or color) failed.
    #[serde(default)]
    pub vision_mismatch: bool,
    /// Replica-vocabulary terms found in the listing text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replica_terms: Vec<String>,
}

impl TrustAssessment {
    /// Seed an assessment from a vendor profile and an initial band.
    #[must_use]
    pub fn from_profile(vendor: impl Into<String>, profile: &VendorProfile, risk: RiskBand) -> Self {
        Self {
            vendor: vendor.into(),
            tls: profile.tls,
            domain_age_days: profile.domain_age_days,
            has_policy_pages: profile.has_policy_pages,
            risk,
            happy_reviews_pct: Some(profile.happy_reviews_pct),
            accepts_returns: Some(profile.accepts_returns),
            average_refund_time_days: Some(profile.average_refund_time_days),
            historical_issues: Some(profile.historical_issues),
            auth_reasons: Vec::new(),
            price_zscore: None,
            weight_zscore: None,
            dimension_zscores: BTreeMap::new(),
            brand_mismatch: false,
            domain_mismatch: false,
            vision_mismatch: false,
            replica_terms: Vec::new(),
        }
    }
}

/// Card details supplied by the caller for checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInput {
    /// Card number; non-digits are stripped during admission.
    pub card_number: String,
    /// Expiry in `MM/YY` form.
    pub expiry_mm_yy: String,
    /// Card verification value; exactly 3 digits.
    pub cvv: String,
    /// Client-supplied amount; the selected offer's price is authoritative.
    pub amount_usd: f64,
}

/// Detected card network, from leading digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    /// Leading 4.
    Visa,
    /// Leading 51–55.
    Mastercard,
    /// Leading 34 or 37.
    Amex,
    /// Leading 6.
    Discover,
    /// Anything else.
    Unknown,
}

impl CardBrand {
    /// The lowercase wire form of the brand.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CardBrand::Visa => "visa",
            CardBrand::Mastercard => "mastercard",
            CardBrand::Amex => "amex",
            CardBrand::Discover => "discover",
            CardBrand::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of a successful checkout. Re-presenting the same idempotency
/// key always returns the identical receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// First 12 hex chars of the canonical payload digest.
    pub order_id: String,
    /// The key this receipt is stored under.
    pub idempotency_key: String,
    /// Charged amount; equals the offer price.
    pub amount_usd: f64,
    /// Vendor paid.
    pub vendor: String,
    /// Detected card network.
    pub card_brand: CardBrand,
    /// Card number with all but the last 4 digits masked.
    pub masked_card: String,
}

/// Robust location/spread statistics for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    /// Reference median.
    pub median: f64,
    /// Robust spread (MAD/IQR based); treated as 1.0 when zero.
    pub spread: f64,
}

/// Reference statistics per metric name (price, weight, height, width,
/// length) for one (brand, category) bucket resolution.
pub type MetricRefs = BTreeMap<String, MetricStats>;
