//! Stripe webhook signature verification.
//!
//! # Security
//!
//! - HMAC-SHA256 over `"{timestamp}.{payload}"` with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secret held as `secrecy::SecretString`

use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::ports::{VerifiedEvent, WebhookVerificationError, WebhookVerifier};

use super::stripe_gateway::StripeConfig;
use super::wire_types::{SignatureHeader, StripeWebhookEvent};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Verifies `Stripe-Signature` headers.
pub struct StripeWebhookVerifier {
    config: StripeConfig,
}

impl StripeWebhookVerifier {
    pub fn new(config: StripeConfig) -> Self {
        Self { config }
    }

    fn verify_signature(
        &self,
        payload: &[u8],
        header: &SignatureHeader,
        now: i64,
    ) -> Result<(), WebhookVerificationError> {
        // `t=` is untrusted; an age that does not fit in i64 is out of any window.
        let Some(age) = now.checked_sub(header.timestamp) else {
            tracing::warn!(event_timestamp = header.timestamp, "Webhook timestamp out of range");
            return Err(if header.timestamp < now {
                WebhookVerificationError::TimestampTooOld { age_secs: i64::MAX }
            } else {
                WebhookVerificationError::TimestampInFuture
            });
        };

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(WebhookVerificationError::TimestampTooOld { age_secs: age });
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(WebhookVerificationError::TimestampInFuture);
        }

        let expected = self.compute_signature(header.timestamp, payload)?;

        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| expected.as_slice().ct_eq(candidate.as_slice()).into());

        if !matched {
            tracing::warn!(event_timestamp = header.timestamp, "Invalid webhook signature");
            return Err(WebhookVerificationError::InvalidSignature);
        }

        Ok(())
    }

    fn compute_signature(
        &self,
        timestamp: i64,
        payload: &[u8],
    ) -> Result<Vec<u8>, WebhookVerificationError> {
        let mut mac =
            HmacSha256::new_from_slice(self.config.webhook_secret.expose_secret().as_bytes())
                .map_err(|_| WebhookVerificationError::InvalidSignature)?;

        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn verify_at(
        &self,
        payload: &[u8],
        signature: &str,
        now: i64,
    ) -> Result<VerifiedEvent, WebhookVerificationError> {
        if signature.trim().is_empty() {
            return Err(WebhookVerificationError::MissingSignature);
        }

        let header = SignatureHeader::parse(signature).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            WebhookVerificationError::MalformedHeader(e.to_string())
        })?;

        self.verify_signature(payload, &header, now)?;

        let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            WebhookVerificationError::InvalidPayload(e.to_string())
        })?;

        if self.config.require_livemode && !event.livemode {
            tracing::warn!(event_id = %event.id, "Rejected test mode event");
            return Err(WebhookVerificationError::TestModeRejected);
        }

        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Webhook signature verified"
        );

        Ok(VerifiedEvent {
            id: event.id,
            event_type: event.event_type,
            created: event.created,
            livemode: event.livemode,
            object: event.data.object,
        })
    }
}

impl WebhookVerifier for StripeWebhookVerifier {
    fn verify(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<VerifiedEvent, WebhookVerificationError> {
        self.verify_at(payload, signature, chrono::Utc::now().timestamp())
    }
}

/// Builds a valid `Stripe-Signature` header for a payload.
///
/// Used by tests and local tooling that replay events against the webhook route.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let verifier = StripeWebhookVerifier::new(StripeConfig::new("", secret));
    match verifier.compute_signature(timestamp, payload) {
        Ok(signature) => format!("t={},v1={}", timestamp, hex::encode(signature)),
        Err(_) => format!("t={}", timestamp),
    }
}
