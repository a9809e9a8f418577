//! Bearer token verification errors.

use thiserror::Error;

/// Errors that can occur while verifying a bearer token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization: Bearer` header.
    #[error("missing bearer token")]
    MissingToken,

    /// Not three base64url segments with JSON header and claims.
    #[error("malformed token: {0}")]
    Malformed(&'static str),

    /// Only HS256 is accepted.
    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature does not match the configured secret.
    #[error("invalid token signature")]
    BadSignature,

    /// `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// `nbf` is in the future.
    #[error("token not yet valid")]
    NotYetValid,

    /// `sub` is not a user id.
    #[error("invalid token subject")]
    InvalidSubject,
}
