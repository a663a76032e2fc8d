//! Webhook verifier port.
//!
//! Authenticates a provider-pushed payload and parses its envelope. Nothing
//! downstream of the verifier ever sees an unauthenticated payload.

use thiserror::Error;

use crate::domain::billing::BillingError;

/// Port for provider webhook authentication.
pub trait WebhookVerifier: Send + Sync {
    /// Verify the signature header against the raw payload and parse the envelope.
    fn verify(&self, payload: &[u8], signature: &str)
        -> Result<VerifiedEvent, WebhookVerificationError>;
}

/// An authenticated provider event envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedEvent {
    /// Provider event ID (evt_...).
    pub id: String,

    /// Event type (e.g., "checkout.session.completed").
    pub event_type: String,

    /// When the event was created (Unix timestamp).
    pub created: i64,

    /// Whether this is a live mode event.
    pub livemode: bool,

    /// The object the event is about, still provider-shaped.
    pub object: serde_json::Value,
}

/// Why a pushed event was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookVerificationError {
    #[error("Missing signature header")]
    MissingSignature,

    #[error("Malformed signature header: {0}")]
    MalformedHeader(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Event too old ({age_secs} seconds)")]
    TimestampTooOld { age_secs: i64 },

    #[error("Event timestamp in future")]
    TimestampInFuture,

    #[error("Test mode events not allowed")]
    TestModeRejected,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<WebhookVerificationError> for BillingError {
    fn from(err: WebhookVerificationError) -> Self {
        BillingError::InvalidEvent(err.to_string())
    }
}
