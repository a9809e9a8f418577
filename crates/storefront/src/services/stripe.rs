//! Stripe `PaymentIntents` client.
//!
//! Creates one payment intent per order. The order number doubles as the
//! idempotency key, so a retried request never creates a second intent for
//! the same order.

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

use super::payment::{Authorization, AuthorizationRequest, PaymentError, PaymentGateway};
use crate::config::StripeConfig;

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: StripeApiError,
}

#[derive(Debug, Deserialize)]
struct StripeApiError {
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
    param: Option<String>,
    message: Option<String>,
}

impl StripeApiError {
    fn into_payment_error(self, status: StatusCode) -> PaymentError {
        let message = self
            .message
            .unwrap_or_else(|| format!("Stripe returned {status}"));
        if self.kind.as_deref() == Some("card_error") {
            return PaymentError::Declined(message);
        }
        if self.param.as_deref() == Some("amount")
            || matches!(
                self.code.as_deref(),
                Some("amount_too_small" | "amount_too_large")
            )
        {
            return PaymentError::InvalidAmount(message);
        }
        PaymentError::Response(message)
    }
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: SecretString,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
        }
    }
}

impl PaymentGateway for StripeClient {
    #[instrument(
        skip(self, request),
        fields(order_number = %request.order_number, amount = %request.amount)
    )]
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<Authorization, PaymentError> {
        let minor_units = request
            .amount
            .to_minor_units()
            .map_err(|e| PaymentError::InvalidAmount(e.to_string()))?;
        if minor_units <= 0 {
            return Err(PaymentError::InvalidAmount(format!(
                "amount must be positive (got {})",
                request.amount
            )));
        }

        let form = [
            ("amount", minor_units.to_string()),
            (
                "currency",
                request.amount.currency_code.as_lower_str().to_string(),
            ),
            ("metadata[order_number]", request.order_number.to_string()),
            ("metadata[user_id]", request.user_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/payment_intents", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .header("Idempotency-Key", request.order_number.as_str())
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let envelope: ErrorEnvelope = response
                .json()
                .await
                .map_err(|e| PaymentError::Response(format!("{status}: {e}")))?;
            let err = envelope.error.into_payment_error(status);
            if matches!(err, PaymentError::Declined(_)) {
                warn!(error = %err, "Stripe declined payment intent");
            } else {
                error!(error = %err, %status, "Stripe API error creating payment intent");
            }
            return Err(err);
        }

        let intent: PaymentIntent = response
            .json()
            .await
            .map_err(|e| PaymentError::Response(e.to_string()))?;
        let client_secret = intent
            .client_secret
            .ok_or_else(|| PaymentError::Response("payment intent has no client_secret".into()))?;

        debug!(payment_intent_id = %intent.id, "Payment intent created");

        Ok(Authorization {
            reference: intent.id,
            client_secret: SecretString::from(client_secret),
        })
    }
}
