use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub type ConsumerKey = String;
pub type ParamName = String;

/// Rendered in place of a claim the launch did not carry.
pub const NOT_AVAILABLE: &str = "N/A";

/// Default lifetime of an issued session token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest session lifetime a token may be issued with (ten years).
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Default tolerance between the consumer's `oauth_timestamp` and our clock.
pub const DEFAULT_TIMESTAMP_SKEW: Duration = Duration::from_secs(5 * 60);

/// The (key, secret) pair shared with the one trusted tool consumer.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConsumerCredential {
    pub key: ConsumerKey,
    pub secret: String,
}

impl ConsumerCredential {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// False when either half is missing; such a credential must never verify a launch.
    pub fn is_configured(&self) -> bool {
        !self.key.trim().is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for ConsumerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCredential")
            .field("key", &self.key)
            .field("secret", &redacted(&self.secret))
            .finish()
    }
}

/// Render a secret for logs and diagnostics.
pub fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}

/// An inbound signed form submission plus the transport metadata the
/// signature was computed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub method: String,
    pub url: String,
    pub content_type: Option<String>,
    pub params: Vec<(ParamName, String)>,
}

impl LaunchRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            content_type: None,
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// First value of `name`, if any.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn param_count(&self, name: &str) -> usize {
        self.params.iter().filter(|(k, _)| k == name).count()
    }

    /// Replace every value of `name` with a single `value`.
    pub fn set_param(&mut self, name: &str, value: impl Into<String>) {
        self.remove_param(name);
        self.params.push((name.to_string(), value.into()));
    }

    pub fn remove_param(&mut self, name: &str) {
        self.params.retain(|(k, _)| k != name);
    }
}

/// The fixed set of identity/context fields carried by a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimField {
    UserId,
    GivenName,
    FamilyName,
    FullName,
    Email,
    Roles,
    ContextId,
    ContextTitle,
    ContextLabel,
}

impl ClaimField {
    pub const ALL: [ClaimField; 9] = [
        ClaimField::UserId,
        ClaimField::GivenName,
        ClaimField::FamilyName,
        ClaimField::FullName,
        ClaimField::Email,
        ClaimField::Roles,
        ClaimField::ContextId,
        ClaimField::ContextTitle,
        ClaimField::ContextLabel,
    ];

    /// Launch parameter the field is read from.
    pub fn param_name(self) -> &'static str {
        match self {
            ClaimField::UserId => "user_id",
            ClaimField::GivenName => "lis_person_name_given",
            ClaimField::FamilyName => "lis_person_name_family",
            ClaimField::FullName => "lis_person_name_full",
            ClaimField::Email => "lis_person_contact_email_primary",
            ClaimField::Roles => "roles",
            ClaimField::ContextId => "context_id",
            ClaimField::ContextTitle => "context_title",
            ClaimField::ContextLabel => "context_label",
        }
    }

    /// Name of the field inside the token payload.
    pub fn claim_name(self) -> &'static str {
        match self {
            ClaimField::UserId => "userId",
            ClaimField::GivenName => "firstName",
            ClaimField::FamilyName => "lastName",
            ClaimField::FullName => "fullName",
            ClaimField::Email => "email",
            ClaimField::Roles => "roles",
            ClaimField::ContextId => "courseId",
            ClaimField::ContextTitle => "courseTitle",
            ClaimField::ContextLabel => "contextLabel",
        }
    }
}

/// Identity and course context extracted from a verified launch.
///
/// Absent fields are `None` (or an empty role list). Use [`IdentityClaims::display`]
/// to read a field with the [`NOT_AVAILABLE`] sentinel applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "firstName", default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(rename = "lastName", default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(rename = "fullName", default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Comma separated, exactly as the launch sent it. See [`IdentityClaims::roles`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<String>,
    #[serde(rename = "courseId", default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(rename = "courseTitle", default, skip_serializing_if = "Option::is_none")]
    pub context_title: Option<String>,
    #[serde(rename = "contextLabel", default, skip_serializing_if = "Option::is_none")]
    pub context_label: Option<String>,
}

impl IdentityClaims {
    /// Value of `field`, or `None` when the launch did not carry it.
    pub fn value(&self, field: ClaimField) -> Option<Cow<'_, str>> {
        let single = match field {
            ClaimField::UserId => &self.user_id,
            ClaimField::GivenName => &self.given_name,
            ClaimField::FamilyName => &self.family_name,
            ClaimField::FullName => &self.full_name,
            ClaimField::Email => &self.email,
            ClaimField::ContextId => &self.context_id,
            ClaimField::ContextTitle => &self.context_title,
            ClaimField::ContextLabel => &self.context_label,
            ClaimField::Roles => &self.roles,
        };
        single.as_deref().map(Cow::Borrowed)
    }

    /// Value of `field` with [`NOT_AVAILABLE`] standing in for absent data.
    pub fn display(&self, field: ClaimField) -> Cow<'_, str> {
        self.value(field).unwrap_or(Cow::Borrowed(NOT_AVAILABLE))
    }

    /// Every field keyed by its claim name, sentinels applied.
    pub fn to_display_pairs(&self) -> Vec<(&'static str, String)> {
        ClaimField::ALL
            .iter()
            .map(|f| (f.claim_name(), self.display(*f).into_owned()))
            .collect()
    }

    /// Individual role names or URNs, trimmed, blanks dropped.
    pub fn roles(&self) -> Vec<&str> {
        self.roles
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .collect()
    }
}

/// Rules applied by the launch verifier beyond the signature itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPolicy {
    /// Reject launches whose `oauth_timestamp` is further than this from now.
    /// `None` disables the check.
    pub max_timestamp_skew: Option<Duration>,
    /// Require `lti_message_type`, `lti_version` and `resource_link_id`.
    pub require_lti_parameters: bool,
}

impl Default for LaunchPolicy {
    fn default() -> Self {
        Self {
            max_timestamp_skew: Some(DEFAULT_TIMESTAMP_SKEW),
            require_lti_parameters: true,
        }
    }
}

/// Signing secret and lifetime of issued session tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    pub signing_secret: String,
    pub ttl: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }
}

impl fmt::Debug for TokenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPolicy")
            .field("signing_secret", &redacted(&self.signing_secret))
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Response shape of the token validation entrypoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<IdentityClaims>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenValidation {
    pub fn accepted(claims: IdentityClaims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn rejected(error: impl fmt::Display) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LtiError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Named secret lookup (process environment, `.env` files, test fixtures).
pub trait SecretStore: Send + Sync {
    fn get(&self, name: &str) -> Result<String, LtiError>;
}
