//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//!
//! Every error response has the same JSON shape:
//!
//! ```json
//! {"error": "invalid_transition", "message": "cannot move order from pending to shipping"}
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use edubook_core::TransitionError;

use crate::db::RepositoryError;
use crate::services::{AuthError, CartError, CheckoutError, OrderError, PaymentError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Checkout was attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Missing or invalid bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    /// Authenticated but not allowed.
    #[error("Forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested status change is not in the transition table.
    #[error("Invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    /// Lost a race or hit a uniqueness constraint.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payment gateway refused or failed.
    #[error("Payment authorization error: {0}")]
    PaymentAuthorization(#[from] PaymentError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl AppError {
    /// Stable machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Internal(_) => "internal_error",
            Self::Validation(_) => "validation_error",
            Self::EmptyCart => "empty_cart",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Conflict(_) => "conflict",
            Self::PaymentAuthorization(_) => "payment_authorization_error",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) | Self::EmptyCart => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTransition(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentAuthorization(err) => match err {
                PaymentError::Declined(_) | PaymentError::InvalidAmount(_) => {
                    StatusCode::PAYMENT_REQUIRED
                }
                PaymentError::Timeout(_) | PaymentError::Request(_) | PaymentError::Response(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
        }
    }

    fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::PaymentAuthorization(
                PaymentError::Timeout(_) | PaymentError::Request(_) | PaymentError::Response(_),
            ) => "Payment service unavailable, please try again".to_string(),
            Self::PaymentAuthorization(err) => err.to_string(),
            Self::Unauthorized(err) => err.to_string(),
            Self::Validation(msg) | Self::NotFound(msg) | Self::Conflict(msg) => msg.clone(),
            Self::InvalidTransition(err) => err.to_string(),
            Self::EmptyCart => "Cart is empty".to_string(),
            Self::Forbidden => "You do not have access to this resource".to_string(),
        };

        let body = ErrorResponse {
            error: self.kind(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::Validation(msg) => Self::Validation(msg),
            CartError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            CartError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => Self::EmptyCart,
            CheckoutError::Validation(msg) => Self::Validation(msg),
            CheckoutError::Payment(e) => Self::PaymentAuthorization(e),
            CheckoutError::Conflict(msg) => Self::Conflict(msg),
            CheckoutError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound => Self::NotFound("order not found".to_string()),
            OrderError::Forbidden => Self::Forbidden,
            OrderError::InvalidTransition(e) => Self::InvalidTransition(e),
            err @ OrderError::Conflict => Self::Conflict(err.to_string()),
            OrderError::Repository(e) => Self::Database(e),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
