//! Payment provider configuration

use serde::Deserialize;

use crate::adapters::stripe::StripeConfig;

use super::error::ValidationError;

/// Stripe credentials and transport settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    pub stripe_api_key: String,

    /// Webhook signing secret
    pub stripe_webhook_secret: String,

    /// Overrides the Stripe API host (stripe-mock, recorded fixtures).
    pub api_base_url: Option<String>,

    /// Reject test-mode webhook events
    #[serde(default)]
    pub require_livemode: bool,
}

impl PaymentConfig {
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    /// Adapter configuration; the secrets move into `SecretString`s here.
    pub fn stripe_config(&self) -> StripeConfig {
        let config = StripeConfig::new(&self.stripe_api_key, &self.stripe_webhook_secret)
            .with_require_livemode(self.require_livemode);
        match &self.api_base_url {
            Some(url) => config.with_base_url(url),
            None => config,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "PAYMENT__STRIPE_WEBHOOK_SECRET",
            ));
        }
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if let Some(url) = &self.api_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidApiBaseUrl);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: "sk_test_abcd1234".to_string(),
            stripe_webhook_secret: "whsec_xyz789".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn key_prefix_determines_mode() {
        assert!(valid().is_test_mode());
        let live = PaymentConfig {
            stripe_api_key: "sk_live_xxx".to_string(),
            ..valid()
        };
        assert!(live.is_live_mode());
        assert!(!live.is_test_mode());
    }

    #[test]
    fn secrets_are_required() {
        assert_eq!(
            PaymentConfig::default().validate(),
            Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"))
        );
        let no_secret = PaymentConfig {
            stripe_webhook_secret: String::new(),
            ..valid()
        };
        assert!(no_secret.validate().is_err());
    }

    #[test]
    fn prefixes_are_checked() {
        let publishable = PaymentConfig {
            stripe_api_key: "pk_test_xxx".to_string(),
            ..valid()
        };
        assert_eq!(publishable.validate(), Err(ValidationError::InvalidStripeKey));

        let bad_secret = PaymentConfig {
            stripe_webhook_secret: "secret_xxx".to_string(),
            ..valid()
        };
        assert_eq!(
            bad_secret.validate(),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn base_url_must_be_http() {
        let config = PaymentConfig {
            api_base_url: Some("localhost:12111".to_string()),
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidApiBaseUrl));

        let config = PaymentConfig {
            api_base_url: Some("http://localhost:12111".to_string()),
            ..valid()
        };
        assert!(config.validate().is_ok());
    }
}
