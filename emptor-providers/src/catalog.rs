//! Embedded static catalog source.

use std::sync::OnceLock;

use async_trait::async_trait;
use emptor_types::{CatalogItem, CatalogSource, ProviderError};

/// The catalog shipped with the crate.
const CATALOG_JSON: &str = include_str!("../data/catalog.json");

/// Catalog source backed by an embedded JSON document, parsed once and
/// immutable thereafter.
pub struct StaticCatalog {
    json: &'static str,
    cache: OnceLock<Vec<CatalogItem>>,
}

impl StaticCatalog {
    /// Create a source over the bundled demo catalog.
    #[must_use]
    pub fn new() -> Self {
        Self { json: CATALOG_JSON, cache: OnceLock::new() }
    }

    /// Create a source over caller-supplied JSON (a `CatalogItem` array).
    /// Parse errors surface on the first [`CatalogSource::load`].
    #[must_use]
    pub fn from_json(json: &'static str) -> Self {
        Self { json, cache: OnceLock::new() }
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn load(&self) -> Result<Vec<CatalogItem>, ProviderError> {
        if let Some(items) = self.cache.get() {
            return Ok(items.clone());
        }
        let items: Vec<CatalogItem> = serde_json::from_str(self.json)
            .map_err(|err| ProviderError::InvalidResponse(format!("catalog parse: {err}")))?;
        tracing::debug!(items = items.len(), "catalog loaded");
        Ok(self.cache.get_or_init(|| items).clone())
    }
}
