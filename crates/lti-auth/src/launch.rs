//! LTI 1.x launch verification.

use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lti_api::{ConsumerCredential, IdentityClaims, LaunchPolicy, LaunchRequest};
use subtle::ConstantTimeEq;
use tracing::{debug, error, warn};

use crate::LaunchError;
use crate::claims::extract_claims;
use crate::form::FORM_CONTENT_TYPE;
use crate::oauth::{
    OAUTH_CONSUMER_KEY, OAUTH_NONCE, OAUTH_SIGNATURE, OAUTH_SIGNATURE_METHOD, OAUTH_TIMESTAMP,
    OAUTH_VERSION, SignatureMethod, compute_signature,
};

pub const LTI_MESSAGE_TYPE: &str = "lti_message_type";
pub const LTI_VERSION: &str = "lti_version";
pub const RESOURCE_LINK_ID: &str = "resource_link_id";

pub const BASIC_LAUNCH_MESSAGE: &str = "basic-lti-launch-request";
pub const SUPPORTED_LTI_VERSIONS: [&str; 2] = ["LTI-1p0", "LTI-1p2"];

/// Outcome of verifying one launch.
pub type VerificationResult = std::result::Result<VerifiedLaunch, LaunchError>;

/// A launch whose signature checked out. Only [`LaunchVerifier`] creates these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedLaunch {
    request: LaunchRequest,
}

impl VerifiedLaunch {
    pub fn request(&self) -> &LaunchRequest {
        &self.request
    }

    pub fn consumer_key(&self) -> &str {
        self.request.param(OAUTH_CONSUMER_KEY).unwrap_or_default()
    }

    /// Identity claims carried by the launch.
    pub fn claims(&self) -> IdentityClaims {
        extract_claims(&self.request)
    }
}

/// Verifies launches against the one registered consumer.
#[derive(Debug, Clone)]
pub struct LaunchVerifier {
    credential: ConsumerCredential,
    policy: LaunchPolicy,
}

impl LaunchVerifier {
    pub fn new(credential: ConsumerCredential, policy: LaunchPolicy) -> Self {
        Self { credential, policy }
    }

    /// Verify `request` against the current time.
    pub fn verify(&self, request: LaunchRequest) -> VerificationResult {
        self.verify_at(request, SystemTime::now())
    }

    /// Verify `request` as if the clock read `now`.
    pub fn verify_at(&self, request: LaunchRequest, now: SystemTime) -> VerificationResult {
        match self.check(&request, now) {
            Ok(()) => {
                debug!(
                    consumer_key = %self.credential.key,
                    resource_link_id = request.param(RESOURCE_LINK_ID).unwrap_or_default(),
                    "launch verified"
                );
                Ok(VerifiedLaunch { request })
            }
            Err(err) if err.is_misconfiguration() => {
                error!(reason = err.kind(), error = %err, "launch verification misconfigured");
                Err(err)
            }
            Err(err) => {
                warn!(
                    reason = err.kind(),
                    error = %err,
                    url = %request.url,
                    "launch rejected"
                );
                Err(err)
            }
        }
    }

    fn check(&self, request: &LaunchRequest, now: SystemTime) -> Result<(), LaunchError> {
        if !self.credential.is_configured() {
            return Err(LaunchError::MisconfiguredCredential(
                "consumer key or secret is not set".to_string(),
            ));
        }

        check_content_type(request)?;
        let oauth = OAuthParams::parse(request)?;
        if self.policy.require_lti_parameters {
            check_lti_parameters(request)?;
        }

        if oauth.consumer_key != self.credential.key {
            return Err(LaunchError::UnknownConsumer(oauth.consumer_key.to_string()));
        }

        let expected = compute_signature(request, &self.credential.secret, oauth.method)?;
        let supplied = oauth.signature.as_bytes();
        let matches = expected.len() == supplied.len()
            && bool::from(expected.as_bytes().ct_eq(supplied));
        if !matches {
            return Err(LaunchError::SignatureMismatch);
        }

        if let Some(skew) = self.policy.max_timestamp_skew {
            check_timestamp(oauth.timestamp, now, skew)?;
        }
        Ok(())
    }
}

/// Verify with the default policy.
pub fn verify(request: LaunchRequest, credential: &ConsumerCredential) -> VerificationResult {
    LaunchVerifier::new(credential.clone(), LaunchPolicy::default()).verify(request)
}

/// The OAuth protocol parameters of a launch, structurally checked.
struct OAuthParams<'a> {
    consumer_key: &'a str,
    method: SignatureMethod,
    timestamp: u64,
    signature: &'a str,
}

impl<'a> OAuthParams<'a> {
    fn parse(request: &'a LaunchRequest) -> Result<Self, LaunchError> {
        let consumer_key = required(request, OAUTH_CONSUMER_KEY)?;
        let method = SignatureMethod::from_str(required(request, OAUTH_SIGNATURE_METHOD)?)?;
        let timestamp = parse_timestamp(required(request, OAUTH_TIMESTAMP)?)?;
        required(request, OAUTH_NONCE)?;

        if request.param_count(OAUTH_SIGNATURE) > 1 {
            return Err(LaunchError::malformed("oauth_signature given more than once"));
        }
        let signature = required(request, OAUTH_SIGNATURE)?;

        if let Some(version) = request.param(OAUTH_VERSION) {
            if version != "1.0" {
                return Err(LaunchError::malformed(format!(
                    "unsupported oauth_version: {version}"
                )));
            }
        }

        Ok(Self {
            consumer_key,
            method,
            timestamp,
            signature,
        })
    }
}

fn required<'a>(request: &'a LaunchRequest, name: &str) -> Result<&'a str, LaunchError> {
    match request.param(name) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LaunchError::malformed(format!("missing {name}"))),
    }
}

fn parse_timestamp(raw: &str) -> Result<u64, LaunchError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LaunchError::malformed(format!(
            "oauth_timestamp {raw:?} is not a unix timestamp"
        )));
    }
    raw.parse::<u64>()
        .map_err(|_| LaunchError::malformed(format!("oauth_timestamp {raw:?} is out of range")))
}

fn check_content_type(request: &LaunchRequest) -> Result<(), LaunchError> {
    let Some(content_type) = request.content_type.as_deref() else {
        return Ok(());
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
        Ok(())
    } else {
        Err(LaunchError::malformed(format!(
            "launch must be a form submission, got content type {content_type:?}"
        )))
    }
}

fn check_lti_parameters(request: &LaunchRequest) -> Result<(), LaunchError> {
    let message_type = required(request, LTI_MESSAGE_TYPE)?;
    if message_type != BASIC_LAUNCH_MESSAGE {
        return Err(LaunchError::malformed(format!(
            "unsupported lti_message_type: {message_type}"
        )));
    }
    let version = required(request, LTI_VERSION)?;
    if !SUPPORTED_LTI_VERSIONS.contains(&version) {
        return Err(LaunchError::malformed(format!(
            "unsupported lti_version: {version}"
        )));
    }
    required(request, RESOURCE_LINK_ID)?;
    Ok(())
}

fn check_timestamp(timestamp: u64, now: SystemTime, skew: Duration) -> Result<(), LaunchError> {
    let now = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs();
    if now.abs_diff(timestamp) > skew.as_secs() {
        return Err(LaunchError::StaleTimestamp {
            timestamp,
            skew_seconds: skew.as_secs(),
        });
    }
    Ok(())
}
