//! Payment authorization seam.
//!
//! Checkout asks a [`PaymentGateway`] to authorize the order total once per
//! order. The gateway returns a reference stored on the order and a
//! client-facing secret the browser uses to confirm the payment.

use std::future::Future;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use edubook_core::{OrderNumber, Price, UserId};

/// Errors returned by a payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The processor refused the payment.
    #[error("payment declined: {0}")]
    Declined(String),

    /// The amount cannot be charged (zero, too small, wrong precision).
    #[error("invalid payment amount: {0}")]
    InvalidAmount(String),

    /// No answer within the configured bound.
    #[error("payment authorization timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be sent.
    #[error("payment request failed: {0}")]
    Request(String),

    /// The processor answered with something unusable.
    #[error("unexpected payment response: {0}")]
    Response(String),
}

/// What to authorize.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub amount: Price,
    pub order_number: OrderNumber,
    pub user_id: UserId,
}

/// A successful authorization.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct Authorization {
    /// Processor-side id, stored on the order.
    pub reference: String,
    /// Handed to the client to complete payment.
    pub client_secret: SecretString,
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorization")
            .field("reference", &self.reference)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// An external payment processor.
pub trait PaymentGateway: Send + Sync + 'static {
    /// Create a payment authorization for `request.amount`.
    fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> impl Future<Output = Result<Authorization, PaymentError>> + Send;
}
