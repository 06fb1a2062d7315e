//! Deterministic vision provider driven by image-handle tokens.

use async_trait::async_trait;
use emptor_types::{COLOR_VOCAB, ProductHypothesis, ProviderError, VisionProvider};

/// Object labels the pipeline knows how to shop for, with their
/// human-facing names and catalog categories.
const OBJECT_CONFIG: &[(&str, &str, &str)] = &[
    ("bottle", "water bottle", "drinkware"),
    ("cup", "cup", "drinkware"),
    ("pen", "pen", "office_supplies"),
    ("book", "book", "media"),
    ("laptop", "laptop", "electronics"),
    ("keyboard", "keyboard", "electronics"),
    ("mouse", "computer mouse", "electronics"),
    ("cell phone", "smartphone", "electronics"),
    ("backpack", "backpack", "bags"),
    ("sneaker", "sneaker", "footwear"),
];

/// Known brand spellings and their canonical names.
const BRANDS: &[(&str, &str)] = &[
    ("nike", "Nike"),
    ("adidas", "Adidas"),
    ("puma", "Puma"),
    ("reebok", "Reebok"),
    ("under armour", "Under Armour"),
    ("new balance", "New Balance"),
    ("camelbak", "CamelBak"),
    ("contigo", "Contigo"),
    ("pilot", "Pilot"),
    ("bic", "BIC"),
    ("sharpie", "Sharpie"),
    ("stabilo", "Stabilo"),
    ("logitech", "Logitech"),
    ("razer", "Razer"),
    ("hp", "HP"),
    ("lenovo", "Lenovo"),
    ("dell", "Dell"),
    ("asus", "ASUS"),
    ("acer", "Acer"),
    ("apple", "Apple"),
    ("samsung", "Samsung"),
    ("sony", "Sony"),
    ("anker", "Anker"),
];

/// Brands that imply a default object when the label itself is missing.
const BRAND_DEFAULT_LABEL: &[(&str, &str)] = &[
    ("nike", "sneaker"),
    ("adidas", "sneaker"),
    ("puma", "sneaker"),
    ("reebok", "sneaker"),
    ("under armour", "sneaker"),
    ("new balance", "sneaker"),
];

/// Vision provider that reads the hypothesis out of the image handle.
///
/// A handle like `nike_bottle_blue.jpg` yields label "bottle", brand "Nike",
/// color "blue". This stands in for a real recognizer in tests, demos, and
/// offline runs; anything unrecognized becomes the low-confidence
/// unknown-object hypothesis and the pipeline continues.
pub struct HeuristicVision;

impl HeuristicVision {
    /// Create the provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn hypothesize(image: &str) -> ProductHypothesis {
        let text = handle_text(image);

        let brand = BRANDS
            .iter()
            .find(|(needle, _)| contains_word(&text, needle))
            .map(|(_, canonical)| (*canonical).to_string());

        let mut label = OBJECT_CONFIG
            .iter()
            .find(|(needle, _, _)| contains_word(&text, needle))
            .map(|(needle, _, _)| (*needle).to_string());
        if label.is_none()
            && let Some(brand_key) = brand.as_deref()
        {
            label = BRAND_DEFAULT_LABEL
                .iter()
                .find(|(b, _)| brand_key.eq_ignore_ascii_case(b))
                .map(|(_, l)| (*l).to_string());
        }

        let color = COLOR_VOCAB
            .iter()
            .find(|c| contains_word(&text, c))
            .map(|c| (*c).to_string());

        match label {
            Some(label) => {
                let config = OBJECT_CONFIG.iter().find(|(needle, _, _)| *needle == label);
                ProductHypothesis {
                    display_name: config.map(|(_, display, _)| (*display).to_string()),
                    category: config.map(|(_, _, category)| (*category).to_string()),
                    label,
                    brand,
                    color,
                    bbox: None,
                    confidence: 0.9,
                }
            }
            None => ProductHypothesis { brand, color, ..ProductHypothesis::unknown() },
        }
    }
}

impl Default for HeuristicVision {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased handle text with the path, extension, and separators removed.
fn handle_text(image: &str) -> String {
    let name = image.rsplit(['/', '\\']).next().unwrap_or(image);
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    stem.to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect()
}

/// Whole-word (possibly multi-word) containment on space-separated text.
fn contains_word(text: &str, needle: &str) -> bool {
    format!(" {text} ").contains(&format!(" {needle} "))
}

#[async_trait]
impl VisionProvider for HeuristicVision {
    async fn detect(&self, image: &str) -> Result<ProductHypothesis, ProviderError> {
        let hypothesis = Self::hypothesize(image);
        tracing::debug!(
            image = %image,
            label = %hypothesis.label,
            confidence = hypothesis.confidence,
            "heuristic vision detection"
        );
        Ok(hypothesis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recognizes_brand_label_and_color() {
        let hypo = HeuristicVision::new().detect("shots/nike_bottle_blue.jpg").await.unwrap();
        assert_eq!(hypo.label, "bottle");
        assert_eq!(hypo.brand.as_deref(), Some("Nike"));
        assert_eq!(hypo.color.as_deref(), Some("blue"));
        assert_eq!(hypo.category.as_deref(), Some("drinkware"));
        assert_eq!(hypo.display(), "water bottle");
        assert!(hypo.confidence > 0.8);
    }

    #[tokio::test]
    async fn shoe_brand_defaults_to_sneaker() {
        let hypo = HeuristicVision::new().detect("adidas-red.png").await.unwrap();
        assert_eq!(hypo.label, "sneaker");
        assert_eq!(hypo.brand.as_deref(), Some("Adidas"));
        assert_eq!(hypo.color.as_deref(), Some("red"));
    }

    #[tokio::test]
    async fn unrecognized_handle_yields_unknown_object() {
        let hypo = HeuristicVision::new().detect("IMG_20240601_1234.jpg").await.unwrap();
        assert!(hypo.is_unknown());
        assert_eq!(hypo.confidence, 0.75);
        assert!(hypo.brand.is_none());
    }

    #[test]
    fn brand_match_is_whole_word() {
        // "hp" must not fire inside unrelated tokens.
        let hypo = HeuristicVision::hypothesize("graphpaper_notes.jpg");
        assert!(hypo.brand.is_none());
    }
}
