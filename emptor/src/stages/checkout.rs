//! S5 — checkout admission and idempotent payment.
//!
//! Admission runs the checks in a fixed order, each mapping to its own
//! [`AdmissionError`]. Failures of the expiry, Luhn, and CVV steps count
//! against the card's velocity; a success resets it. The receipt is stored
//! under the idempotency key, so re-presenting the same key returns the
//! stored receipt bit-for-bit.

use std::sync::Arc;

use chrono::{Datelike, Utc};

use emptor_types::{
    AdmissionError, AgentMessage, EventKind, IdempotencyStore, Offer, PaymentInput, Receipt,
    SagaError, Stage, StageEvent,
};

use crate::config::RunConfig;
use crate::context::RunContext;
use crate::payment;
use crate::runner::run_stage;
use crate::saga::Saga;

impl Saga {
    /// Run S5: validate the payment and produce a receipt.
    ///
    /// Missing offer or payment is a soft failure: the refusal is recorded
    /// and the run ends gracefully without a receipt.
    pub(crate) async fn stage_checkout(&self, ctx: &mut RunContext) -> Result<(), SagaError> {
        let (Some(best), Some(payment)) = (ctx.best_offer.clone(), ctx.inputs.payment.clone())
        else {
            ctx.record_event(StageEvent::failed(
                EventKind::Checkout,
                0.0,
                ctx.elapsed_ms(),
                "missing_payment_or_offer",
            ));
            ctx.record_message(AgentMessage::new(
                EventKind::Checkout,
                "checkout",
                "user",
                "Checkout blocked: missing payment or offer.",
                ctx.elapsed_ms(),
            ));
            return Ok(());
        };

        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let idem_key = ctx
            .inputs
            .idempotency_key
            .clone()
            .filter(|key| !key.is_empty());
        let offer = best.clone();
        let body = async move {
            pay(store.as_ref(), &config, &offer, &payment, idem_key.as_deref())
                .await
                .map_err(SagaError::from)
        };
        let timeout = self.config.timeout(Stage::S5);
        let (receipt, dt) = run_stage(ctx, Stage::S5, EventKind::Checkout, timeout, body).await?;

        ctx.record_event(
            StageEvent::succeeded(EventKind::Checkout, dt, ctx.elapsed_ms())
                .with("vendor", best.vendor.clone())
                .with("amount", best.price_usd)
                .with("order_id", receipt.order_id.clone()),
        );
        ctx.record_message(
            AgentMessage::new(
                EventKind::Checkout,
                "checkout",
                "user",
                format!("Order confirmed with {}", best.vendor),
                ctx.elapsed_ms(),
            )
            .with("amount", best.price_usd)
            .with("order_id", receipt.order_id.clone()),
        );
        ctx.receipt = Some(receipt);
        Ok(())
    }
}

/// Run the admission pipeline and store the receipt idempotently.
///
/// The receipt amount is the offer price; any client-supplied amount is
/// ignored.
pub(crate) async fn pay(
    store: &dyn IdempotencyStore,
    config: &RunConfig,
    offer: &Offer,
    payment: &PaymentInput,
    idem_key: Option<&str>,
) -> Result<Receipt, AdmissionError> {
    if offer.price_usd <= 0.0 {
        return Err(AdmissionError::InvalidAmount);
    }
    if offer.price_usd > config.checkout_max_amount {
        return Err(AdmissionError::AmountLimit);
    }
    if config.vendor_blacklist.contains(&offer.vendor) {
        return Err(AdmissionError::VendorBlocked);
    }

    let digits = payment::digits(&payment.card_number);
    if digits.len() < 13 {
        return Err(AdmissionError::CardTooShort);
    }
    let brand = payment::detect_brand(&digits);
    if !payment::valid_length(&digits, brand) {
        return Err(AdmissionError::InvalidCard);
    }
    if store.velocity(&digits).await > 5 {
        return Err(AdmissionError::Velocity);
    }

    if !payment::valid_expiry(&payment.expiry_mm_yy) {
        store.bump_velocity(&digits).await;
        return Err(AdmissionError::InvalidExpiry);
    }
    let now = Utc::now();
    if !payment::expiry_in_future(&payment.expiry_mm_yy, now.year(), now.month()) {
        store.bump_velocity(&digits).await;
        return Err(AdmissionError::Expired);
    }
    if !payment::luhn_check(&digits) {
        store.bump_velocity(&digits).await;
        return Err(AdmissionError::InvalidCard);
    }
    if !payment::valid_cvv(&payment.cvv) {
        store.bump_velocity(&digits).await;
        return Err(AdmissionError::InvalidCvv);
    }
    store.reset_velocity(&digits).await;

    let masked = payment::mask(&digits);
    let digest =
        payment::payload_digest(&offer.vendor, &offer.title, offer.price_usd, &masked, brand);
    let key = idem_key.unwrap_or(&digest);

    let receipt = Receipt {
        order_id: digest[..12].to_string(),
        idempotency_key: key.to_string(),
        amount_usd: offer.price_usd,
        vendor: offer.vendor.clone(),
        card_brand: brand,
        masked_card: masked,
    };
    Ok(store.put_if_absent(key, receipt).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};
    use tokio::sync::Mutex;

    /// Minimal store double; the real one lives in emptor-store-memory.
    struct TestStore {
        receipts: Mutex<HashMap<String, Receipt>>,
        velocity: Mutex<HashMap<String, u32>>,
    }

    impl TestStore {
        fn new() -> Self {
            Self { receipts: Mutex::new(HashMap::new()), velocity: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
    impl IdempotencyStore for TestStore {
        async fn get(&self, key: &str) -> Option<Receipt> {
            self.receipts.lock().await.get(key).cloned()
        }

        async fn put_if_absent(&self, key: &str, receipt: Receipt) -> Receipt {
            self.receipts.lock().await.entry(key.to_string()).or_insert(receipt).clone()
        }

        async fn velocity(&self, card: &str) -> u32 {
            self.velocity.lock().await.get(card).copied().unwrap_or(0)
        }

        async fn bump_velocity(&self, card: &str) -> u32 {
            let mut map = self.velocity.lock().await;
            let count = map.entry(card.to_string()).or_insert(0);
            *count += 1;
            *count
        }

        async fn reset_velocity(&self, card: &str) {
            self.velocity.lock().await.insert(card.to_string(), 0);
        }
    }

    fn offer(vendor: &str, amount: f64) -> Offer {
        Offer {
            vendor: vendor.to_string(),
            title: "Sample".to_string(),
            price_usd: amount,
            shipping_days: 3,
            eta_days: 5,
            url: "https://m.example/item".to_string(),
            score: 1.0,
            category: None,
            keywords: Vec::new(),
            description: None,
            image_url: None,
            attributes: BTreeMap::new(),
        }
    }

    fn card(number: &str, expiry: &str) -> PaymentInput {
        PaymentInput {
            card_number: number.to_string(),
            expiry_mm_yy: expiry.to_string(),
            cvv: "123".to_string(),
            amount_usd: 25.0,
        }
    }

    #[tokio::test]
    async fn successful_payment_produces_a_receipt() {
        let store = TestStore::new();
        let receipt = pay(
            &store,
            &RunConfig::default(),
            &offer("Mockazon", 25.0),
            &card("4242424242424242", "12/29"),
            None,
        )
        .await
        .unwrap();
        assert_eq!(receipt.amount_usd, 25.0);
        assert_eq!(receipt.vendor, "Mockazon");
        assert!(receipt.masked_card.ends_with("4242"));
        assert_eq!(receipt.order_id.len(), 12);
        assert_eq!(receipt.card_brand, emptor_types::CardBrand::Visa);
    }

    #[tokio::test]
    async fn same_key_returns_the_stored_receipt() {
        let store = TestStore::new();
        let config = RunConfig::default();
        let offer = offer("Mockazon", 25.0);
        let payment = card("4242424242424242", "12/29");
        let first = pay(&store, &config, &offer, &payment, Some("abc")).await.unwrap();
        let second = pay(&store, &config, &offer, &payment, Some("abc")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.receipts.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn admission_errors_are_specific() {
        let store = TestStore::new();
        let config = RunConfig::default();
        let payment = card("4242424242424242", "12/29");

        let err = pay(&store, &config, &offer("Mockazon", 0.0), &payment, None).await;
        assert_eq!(err, Err(AdmissionError::InvalidAmount));

        let err = pay(&store, &config, &offer("Mockazon", 6000.0), &payment, None).await;
        assert_eq!(err, Err(AdmissionError::AmountLimit));

        let err = pay(&store, &config, &offer("FraudCo", 25.0), &payment, None).await;
        assert_eq!(err, Err(AdmissionError::VendorBlocked));

        let err = pay(&store, &config, &offer("Mockazon", 25.0), &card("123", "12/29"), None).await;
        assert_eq!(err, Err(AdmissionError::CardTooShort));

        let err =
            pay(&store, &config, &offer("Mockazon", 25.0), &card("4242424242424242", "01/24"), None)
                .await;
        assert_eq!(err, Err(AdmissionError::Expired));

        let err =
            pay(&store, &config, &offer("Mockazon", 25.0), &card("4242424242424241", "12/29"), None)
                .await;
        assert_eq!(err, Err(AdmissionError::InvalidCard));
    }

    #[tokio::test]
    async fn failed_attempts_bump_velocity_until_the_gate_closes() {
        let store = TestStore::new();
        let config = RunConfig::default();
        let bad_expiry = card("4242424242424242", "01/24");
        for _ in 0..6 {
            let err = pay(&store, &config, &offer("Mockazon", 25.0), &bad_expiry, None).await;
            assert_eq!(err, Err(AdmissionError::Expired));
        }
        // Seventh attempt hits the velocity gate even with a good card.
        let err =
            pay(&store, &config, &offer("Mockazon", 25.0), &card("4242424242424242", "12/29"), None)
                .await;
        assert_eq!(err, Err(AdmissionError::Velocity));
    }

    #[tokio::test]
    async fn success_resets_velocity() {
        let store = TestStore::new();
        let config = RunConfig::default();
        let bad_cvv = PaymentInput { cvv: "12".to_string(), ..card("4242424242424242", "12/29") };
        for _ in 0..3 {
            let err = pay(&store, &config, &offer("Mockazon", 25.0), &bad_cvv, None).await;
            assert_eq!(err, Err(AdmissionError::InvalidCvv));
        }
        pay(&store, &config, &offer("Mockazon", 25.0), &card("4242424242424242", "12/29"), None)
            .await
            .unwrap();
        assert_eq!(store.velocity("4242424242424242").await, 0);
    }

    #[tokio::test]
    async fn derived_key_is_the_full_digest() {
        let store = TestStore::new();
        let receipt = pay(
            &store,
            &RunConfig::default(),
            &offer("Mockazon", 25.0),
            &card("4242424242424242", "12/29"),
            None,
        )
        .await
        .unwrap();
        assert_eq!(receipt.idempotency_key.len(), 64);
        assert!(receipt.idempotency_key.starts_with(&receipt.order_id));
    }
}
