//! Card validation and payload hashing primitives for checkout.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use emptor_types::CardBrand;

static EXPIRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/\d{2}$").expect("valid regex"));

static CVV_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3}$").expect("valid regex"));

/// Keep only ASCII digits.
pub(crate) fn digits(card_number: &str) -> String {
    card_number.chars().filter(char::is_ascii_digit).collect()
}

/// Detect the card network from the leading digits.
pub(crate) fn detect_brand(digits: &str) -> CardBrand {
    if digits.starts_with('4') {
        CardBrand::Visa
    } else if ["51", "52", "53", "54", "55"].iter().any(|p| digits.starts_with(p)) {
        CardBrand::Mastercard
    } else if digits.starts_with("34") || digits.starts_with("37") {
        CardBrand::Amex
    } else if digits.starts_with('6') {
        CardBrand::Discover
    } else {
        CardBrand::Unknown
    }
}

/// Whether the digit count fits the detected brand.
pub(crate) fn valid_length(digits: &str, brand: CardBrand) -> bool {
    let length = digits.len();
    match brand {
        CardBrand::Amex => length == 15,
        CardBrand::Visa | CardBrand::Mastercard | CardBrand::Discover => length == 16,
        CardBrand::Unknown => (13..=19).contains(&length),
    }
}

/// Mask all but the last 4 digits.
pub(crate) fn mask(digits: &str) -> String {
    let tail = digits.len().saturating_sub(4);
    format!("{}{}", "*".repeat(tail), &digits[tail..])
}

/// Luhn checksum over the digit string.
pub(crate) fn luhn_check(digits: &str) -> bool {
    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if values.is_empty() {
        return false;
    }
    let parity = values.len() % 2;
    let checksum: u32 = values
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == parity {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    checksum % 10 == 0
}

/// Whether `exp` is `MM/YY` with a valid month.
pub(crate) fn valid_expiry(exp: &str) -> bool {
    EXPIRY_RE.is_match(exp)
}

/// Whether `exp` is the reference month or later. Assumes the format is
/// already validated.
pub(crate) fn expiry_in_future(exp: &str, ref_year: i32, ref_month: u32) -> bool {
    if !valid_expiry(exp) {
        return false;
    }
    let Some((month_str, year_str)) = exp.split_once('/') else {
        return false;
    };
    let (Ok(month), Ok(year)) = (month_str.parse::<u32>(), year_str.parse::<i32>()) else {
        return false;
    };
    let year = 2000 + year;
    if year != ref_year {
        return year > ref_year;
    }
    month >= ref_month
}

/// Whether `cvv` is exactly 3 digits.
pub(crate) fn valid_cvv(cvv: &str) -> bool {
    CVV_RE.is_match(cvv)
}

/// SHA-256 hex digest of the canonical checkout payload. Keys serialize in
/// sorted order, so equal inputs always hash identically.
pub(crate) fn payload_digest(
    vendor: &str,
    title: &str,
    amount: f64,
    masked_card: &str,
    card_type: CardBrand,
) -> String {
    let payload = serde_json::json!({
        "vendor": vendor,
        "title": title,
        "amount": amount,
        "masked_card": masked_card,
        "card_type": card_type.as_str(),
    });
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_strips_separators() {
        assert_eq!(digits("4242 4242-4242 4242"), "4242424242424242");
    }

    #[test]
    fn brand_detection_by_prefix() {
        assert_eq!(detect_brand("4242424242424242"), CardBrand::Visa);
        assert_eq!(detect_brand("5500005555555559"), CardBrand::Mastercard);
        assert_eq!(detect_brand("378282246310005"), CardBrand::Amex);
        assert_eq!(detect_brand("6011111111111117"), CardBrand::Discover);
        assert_eq!(detect_brand("9999999999999"), CardBrand::Unknown);
    }

    #[test]
    fn length_rules_per_brand() {
        assert!(valid_length("378282246310005", CardBrand::Amex));
        assert!(!valid_length("3782822463100051", CardBrand::Amex));
        assert!(valid_length("4242424242424242", CardBrand::Visa));
        assert!(!valid_length("424242424242424", CardBrand::Visa));
        assert!(valid_length("9999999999999", CardBrand::Unknown));
        assert!(!valid_length("999999999999", CardBrand::Unknown));
    }

    #[test]
    fn luhn_accepts_known_good_cards() {
        for card in ["4242424242424242", "378282246310005", "6011111111111117"] {
            assert!(luhn_check(card), "{card} should pass");
        }
        assert!(!luhn_check("4242424242424241"));
        assert!(!luhn_check(""));
    }

    #[test]
    fn expiry_format_and_cutoff() {
        assert!(valid_expiry("12/29"));
        assert!(!valid_expiry("13/29"));
        assert!(!valid_expiry("1/29"));
        assert!(!valid_expiry("12-29"));

        assert!(expiry_in_future("12/29", 2026, 8));
        assert!(expiry_in_future("08/26", 2026, 8));
        assert!(!expiry_in_future("07/26", 2026, 8));
        assert!(!expiry_in_future("01/24", 2026, 8));
    }

    #[test]
    fn cvv_is_exactly_three_digits() {
        assert!(valid_cvv("123"));
        assert!(!valid_cvv("12"));
        assert!(!valid_cvv("1234"));
        assert!(!valid_cvv("12a"));
    }

    #[test]
    fn mask_keeps_last_four() {
        assert_eq!(mask("4242424242424242"), "************4242");
        assert_eq!(mask("4242"), "4242");
    }

    #[test]
    fn payload_digest_is_stable_and_input_sensitive() {
        let a = payload_digest("Mockazon", "Sample", 25.0, "************4242", CardBrand::Visa);
        let b = payload_digest("Mockazon", "Sample", 25.0, "************4242", CardBrand::Visa);
        let c = payload_digest("Mockazon", "Sample", 26.0, "************4242", CardBrand::Visa);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
