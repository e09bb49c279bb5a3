//! Session tokens: HS256 JWTs carrying the identity claims of a verified launch.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lti_api::{IdentityClaims, MAX_TOKEN_TTL, TokenPolicy, TokenValidation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::launch::VerifiedLaunch;
use crate::{TokenError, TokenResult};

/// An issued session token. Opaque to holders; URL, header and HTML safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A token together with what went into it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: SessionToken,
    pub claims: IdentityClaims,
    pub issued_at: SystemTime,
    pub expires_at: SystemTime,
}

/// JWT payload: identity claims plus `iat`/`exp` in unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(flatten)]
    identity: IdentityClaims,
    iat: u64,
    exp: u64,
}

/// Signs session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Fails when `signing_secret` is empty or `ttl` exceeds [`MAX_TOKEN_TTL`].
    pub fn new(signing_secret: &str, ttl: Duration) -> TokenResult<Self> {
        if signing_secret.is_empty() {
            return Err(TokenError::MissingSigningSecret);
        }
        if ttl > MAX_TOKEN_TTL {
            return Err(TokenError::TtlOutOfRange {
                ttl_seconds: ttl.as_secs(),
            });
        }
        Ok(Self {
            key: EncodingKey::from_secret(signing_secret.as_bytes()),
            ttl,
        })
    }

    pub fn from_policy(policy: &TokenPolicy) -> TokenResult<Self> {
        Self::new(&policy.signing_secret, policy.ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for a verified launch, valid from now for the ttl.
    pub fn issue(&self, launch: &VerifiedLaunch) -> TokenResult<IssuedToken> {
        self.issue_claims_at(launch.claims(), SystemTime::now())
    }

    /// Issue a token for `claims` as if the clock read `now`.
    pub fn issue_claims_at(
        &self,
        claims: IdentityClaims,
        now: SystemTime,
    ) -> TokenResult<IssuedToken> {
        let out_of_range = || TokenError::TtlOutOfRange {
            ttl_seconds: self.ttl.as_secs(),
        };
        let iat = unix_seconds(now);
        let exp = iat.checked_add(self.ttl.as_secs()).ok_or_else(out_of_range)?;
        let expires_at = UNIX_EPOCH
            .checked_add(Duration::from_secs(exp))
            .ok_or_else(out_of_range)?;
        let payload = SessionClaims {
            identity: claims,
            iat,
            exp,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &payload, &self.key)?;

        debug!(
            user_id = payload.identity.user_id.as_deref().unwrap_or_default(),
            context_id = payload.identity.context_id.as_deref().unwrap_or_default(),
            exp,
            "session token issued"
        );

        Ok(IssuedToken {
            token: SessionToken(token),
            claims: payload.identity,
            issued_at: UNIX_EPOCH + Duration::from_secs(iat),
            expires_at,
        })
    }
}

/// Checks session tokens issued under the same signing secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(signing_secret: &str) -> TokenResult<Self> {
        if signing_secret.is_empty() {
            return Err(TokenError::MissingSigningSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock below, with no leeway.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            key: DecodingKey::from_secret(signing_secret.as_bytes()),
            validation,
        })
    }

    pub fn from_policy(policy: &TokenPolicy) -> TokenResult<Self> {
        Self::new(&policy.signing_secret)
    }

    pub fn verify(&self, token: &str) -> TokenResult<IdentityClaims> {
        self.verify_at(token, SystemTime::now())
    }

    /// Signature first, then expiry against `now`.
    pub fn verify_at(&self, token: &str, now: SystemTime) -> TokenResult<IdentityClaims> {
        let result = self.decode(token, now);
        if let Err(err) = &result {
            warn!(reason = err.kind(), error = %err, "session token rejected");
        }
        result
    }

    /// The validation entrypoint: never fails, always answers.
    pub fn validate(&self, token: &str) -> TokenValidation {
        match self.verify(token) {
            Ok(claims) => TokenValidation::accepted(claims),
            Err(err) => TokenValidation::rejected(err),
        }
    }

    fn decode(&self, token: &str, now: SystemTime) -> TokenResult<IdentityClaims> {
        let data = jsonwebtoken::decode::<SessionClaims>(token.trim(), &self.key, &self.validation)
            .map_err(decode_error)?;
        let claims = data.claims;

        if claims.exp < claims.iat {
            return Err(TokenError::Malformed("exp precedes iat".to_string()));
        }
        if unix_seconds(now) >= claims.exp {
            return Err(TokenError::Expired {
                expired_at: claims.exp,
            });
        }
        Ok(claims.identity)
    }
}

fn decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed(err.to_string()),
    }
}

fn unix_seconds(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Issue a token for `launch` signed with `signing_secret`, valid for `ttl`.
pub fn issue(
    launch: &VerifiedLaunch,
    signing_secret: &str,
    ttl: Duration,
) -> TokenResult<IssuedToken> {
    TokenIssuer::new(signing_secret, ttl)?.issue(launch)
}

/// Verify `token` against `signing_secret` and the current time.
pub fn verify_token(token: &str, signing_secret: &str) -> TokenResult<IdentityClaims> {
    TokenVerifier::new(signing_secret)?.verify(token)
}
