//! Embedded robust price/weight/dimension reference statistics.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use emptor_types::{MetricRefs, MetricStats, PriceRefSource, ProviderError};

/// The reference table shipped with the crate.
const PRICE_REFS_JSON: &str = include_str!("../data/price_refs.json");

type RefTable = BTreeMap<String, MetricRefs>;

/// Reference-statistics source backed by an embedded JSON table keyed
/// `"brand|category"` (empty segments mean "any").
pub struct StaticPriceRefs {
    json: &'static str,
    cache: OnceLock<RefTable>,
}

impl StaticPriceRefs {
    /// Create a source over the bundled reference table.
    #[must_use]
    pub fn new() -> Self {
        Self { json: PRICE_REFS_JSON, cache: OnceLock::new() }
    }

    /// Create a source over caller-supplied JSON. Parse errors surface on
    /// the first lookup.
    #[must_use]
    pub fn from_json(json: &'static str) -> Self {
        Self { json, cache: OnceLock::new() }
    }

    fn table(&self) -> Result<&RefTable, ProviderError> {
        if let Some(table) = self.cache.get() {
            return Ok(table);
        }
        let table: RefTable = serde_json::from_str(self.json)
            .map_err(|err| ProviderError::InvalidResponse(format!("price refs parse: {err}")))?;
        Ok(self.cache.get_or_init(|| table))
    }
}

impl Default for StaticPriceRefs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceRefSource for StaticPriceRefs {
    async fn lookup(
        &self,
        brand: Option<&str>,
        category: Option<&str>,
    ) -> Result<Option<MetricRefs>, ProviderError> {
        let table = self.table()?;
        let brand = brand.unwrap_or("").trim().to_ascii_lowercase();
        let category = category.unwrap_or("").trim().to_ascii_lowercase();

        // Most specific bucket wins per metric: brand+category, then
        // brand-only, then category-only, then global.
        let chain = [
            format!("{brand}|{category}"),
            format!("{brand}|"),
            format!("|{category}"),
            "|".to_string(),
        ];
        let mut merged: BTreeMap<String, MetricStats> = BTreeMap::new();
        for key in &chain {
            if let Some(bucket) = table.get(key) {
                for (metric, stats) in bucket {
                    merged.entry(metric.clone()).or_insert(*stats);
                }
            }
        }
        Ok(if merged.is_empty() { None } else { Some(merged) })
    }
}
