//! Error types.

use thiserror::Error;

/// Result of token operations.
pub type TokenResult<T> = std::result::Result<T, TokenError>;

/// Why a launch was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    /// Required signature parameters are missing or structurally invalid.
    #[error("malformed launch request: {0}")]
    MalformedRequest(String),

    /// The request names a consumer key other than the registered one.
    #[error("unknown consumer key: {0}")]
    UnknownConsumer(String),

    /// The recomputed signature differs from the supplied one.
    #[error("launch signature does not match")]
    SignatureMismatch,

    /// `oauth_timestamp` lies outside the accepted window.
    #[error("oauth_timestamp {timestamp} is outside the allowed window of {skew_seconds}s")]
    StaleTimestamp { timestamp: u64, skew_seconds: u64 },

    /// The registered credential cannot verify anything. Server-side problem.
    #[error("consumer credential is not usable: {0}")]
    MisconfiguredCredential(String),
}

impl LaunchError {
    /// Stable tag for logs and responses.
    pub fn kind(&self) -> &'static str {
        match self {
            LaunchError::MalformedRequest(_) => "malformed_request",
            LaunchError::UnknownConsumer(_) => "unknown_consumer",
            LaunchError::SignatureMismatch => "signature_mismatch",
            LaunchError::StaleTimestamp { .. } => "stale_timestamp",
            LaunchError::MisconfiguredCredential(_) => "misconfigured_credential",
        }
    }

    /// True when the fault lies with our configuration rather than the request.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, LaunchError::MisconfiguredCredential(_))
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        LaunchError::MalformedRequest(msg.into())
    }
}

/// Why a session token was not accepted or could not be issued.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature does not verify against the signing secret.
    #[error("token signature is invalid")]
    InvalidSignature,

    /// Signature is fine but the expiry (unix seconds) has passed.
    #[error("token expired at {expired_at}")]
    Expired { expired_at: u64 },

    /// Not a token we could have issued.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// No signing secret configured.
    #[error("token signing secret is not configured")]
    MissingSigningSecret,

    /// The lifetime does not fit the token's expiry field.
    #[error("token ttl of {ttl_seconds}s is out of range")]
    TtlOutOfRange { ttl_seconds: u64 },

    /// jsonwebtoken error while encoding.
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl TokenError {
    /// Stable tag for logs and responses.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::Expired { .. } => "expired",
            TokenError::Malformed(_) => "malformed",
            TokenError::MissingSigningSecret => "missing_signing_secret",
            TokenError::TtlOutOfRange { .. } => "ttl_out_of_range",
            TokenError::Jwt(_) => "jwt",
        }
    }

    /// True when the fault lies with our configuration rather than the token.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            TokenError::MissingSigningSecret | TokenError::TtlOutOfRange { .. }
        )
    }
}
