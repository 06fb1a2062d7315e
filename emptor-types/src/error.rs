//! Error types for the saga engine and its collaborators.

use std::time::Duration;

use crate::events::Stage;

/// Errors from capability provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not be reached or refused to serve.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// The provider answered with something unusable.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    /// Any other provider error.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from store and record-sink operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error during a store operation.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization failed while writing a record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Client-visible checkout admission failures, one per admission step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// Offer price is zero or negative.
    #[error("invalid offer amount")]
    InvalidAmount,
    /// Offer price exceeds the configured checkout ceiling.
    #[error("amount exceeds checkout limit")]
    AmountLimit,
    /// The vendor is blacklisted.
    #[error("vendor not allowed")]
    VendorBlocked,
    /// Fewer than 13 digits in the card number.
    #[error("card number too short")]
    CardTooShort,
    /// Card length does not fit the detected brand, or Luhn failed.
    #[error("invalid card")]
    InvalidCard,
    /// Too many failed attempts on this card.
    #[error("card flagged for excessive failed attempts")]
    Velocity,
    /// Expiry is not `MM/YY` with a valid month.
    #[error("invalid expiry")]
    InvalidExpiry,
    /// Expiry is in the past.
    #[error("card expired")]
    Expired,
    /// CVV is not exactly 3 digits.
    #[error("invalid CVV")]
    InvalidCvv,
}

/// Errors that abort a saga run.
#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    /// The caller's inputs failed orchestrator preconditions.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A stage ran past its wall-clock limit.
    #[error("stage {stage} timed out after {timeout:?}")]
    StageTimeout {
        /// The stage that timed out.
        stage: Stage,
        /// The limit that was exceeded.
        timeout: Duration,
    },
    /// A capability provider failed with no fallback available.
    #[error("stage {stage} provider error: {source}")]
    Provider {
        /// The stage whose provider failed.
        stage: Stage,
        /// The underlying provider error.
        #[source]
        source: ProviderError,
    },
    /// Sourcing produced nothing to evaluate.
    #[error("no offers matched the intent")]
    NoOffers,
    /// The token budgeter refused a call under the `block` policy.
    /// Always caught by the calling stage, which falls back.
    #[error("token budget exhausted for stage {0}")]
    TokenBudgetBlock(Stage),
    /// A checkout admission step rejected the payment.
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_errors_render_client_messages() {
        assert_eq!(AdmissionError::VendorBlocked.to_string(), "vendor not allowed");
        assert_eq!(AdmissionError::Expired.to_string(), "card expired");
        assert_eq!(
            AdmissionError::Velocity.to_string(),
            "card flagged for excessive failed attempts"
        );
    }

    #[test]
    fn saga_error_names_the_stage() {
        let err = SagaError::StageTimeout { stage: Stage::S3, timeout: Duration::from_secs(18) };
        assert!(err.to_string().contains("S3"));
    }
}
