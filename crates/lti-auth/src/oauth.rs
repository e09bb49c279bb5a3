//! OAuth 1.0a request signing (RFC 5849, section 3.4) as used by LTI 1.x.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use hmac::{Hmac, Mac};
use lti_api::{ConsumerCredential, LaunchRequest};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

use crate::LaunchError;
use crate::form::check_encoded;

pub const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
pub const OAUTH_SIGNATURE_METHOD: &str = "oauth_signature_method";
pub const OAUTH_TIMESTAMP: &str = "oauth_timestamp";
pub const OAUTH_NONCE: &str = "oauth_nonce";
pub const OAUTH_VERSION: &str = "oauth_version";
pub const OAUTH_CALLBACK: &str = "oauth_callback";
pub const OAUTH_SIGNATURE: &str = "oauth_signature";

/// Keyed hash used to sign the base string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureMethod {
    #[default]
    HmacSha1,
    HmacSha256,
}

impl SignatureMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureMethod::HmacSha1 => "HMAC-SHA1",
            SignatureMethod::HmacSha256 => "HMAC-SHA256",
        }
    }
}

impl fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureMethod {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HMAC-SHA1" => Ok(SignatureMethod::HmacSha1),
            "HMAC-SHA256" => Ok(SignatureMethod::HmacSha256),
            other => Err(LaunchError::malformed(format!(
                "unsupported signature method: {other}"
            ))),
        }
    }
}

/// Unreserved characters (RFC 3986 section 2.3) are the only ones left bare.
const RFC3986_RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// RFC 3986 percent-encoding: everything but `A-Z a-z 0-9 - . _ ~` becomes `%XX`.
pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, RFC3986_RESERVED).to_string()
}

fn parse_url(url: &str) -> Result<Url, LaunchError> {
    Url::parse(url).map_err(|e| LaunchError::malformed(format!("launch URL {url:?}: {e}")))
}

/// Base string URI: lowercase scheme and host, no default port, no query or fragment.
pub fn normalize_base_url(url: &str) -> Result<String, LaunchError> {
    let parsed = parse_url(url)?;
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| LaunchError::malformed(format!("launch URL {url:?} has no host")))?;
    match parsed.port() {
        Some(port) => Ok(format!("{}://{host}:{port}{}", parsed.scheme(), parsed.path())),
        None => Ok(format!("{}://{host}{}", parsed.scheme(), parsed.path())),
    }
}

/// Query parameters of the launch URL, decoded.
fn query_params(url: &Url) -> Result<Vec<(String, String)>, LaunchError> {
    if let Some(query) = url.query() {
        check_encoded(query)?;
    }
    Ok(url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

/// Normalized request parameters: body and query parameters except `oauth_signature`,
/// encoded, sorted by name then value, joined with `&`.
pub fn normalized_parameters(request: &LaunchRequest) -> Result<String, LaunchError> {
    let mut pairs: Vec<(String, String)> = request
        .params
        .iter()
        .filter(|(k, _)| k != OAUTH_SIGNATURE)
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    for (k, v) in query_params(&parse_url(&request.url)?)? {
        if k != OAUTH_SIGNATURE {
            pairs.push((percent_encode(&k), percent_encode(&v)));
        }
    }
    pairs.sort();

    Ok(pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&"))
}

/// `METHOD&enc(base_url)&enc(normalized_parameters)`.
pub fn signature_base_string(request: &LaunchRequest) -> Result<String, LaunchError> {
    let method = request.method.trim().to_ascii_uppercase();
    if method.is_empty() {
        return Err(LaunchError::malformed("missing HTTP method"));
    }
    let base_url = normalize_base_url(&request.url)?;
    let params = normalized_parameters(request)?;
    Ok(format!(
        "{method}&{}&{}",
        percent_encode(&base_url),
        percent_encode(&params)
    ))
}

/// HMAC key: `enc(consumer_secret)&enc(token_secret)`.
pub fn signing_key(consumer_secret: &str, token_secret: &str) -> String {
    format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    )
}

/// Sign a base string, base64 encoded.
pub fn sign_base_string(
    method: SignatureMethod,
    key: &str,
    base_string: &str,
) -> Result<String, LaunchError> {
    let digest = match method {
        SignatureMethod::HmacSha1 => hmac_digest::<Hmac<sha1::Sha1>>(key, base_string)?,
        SignatureMethod::HmacSha256 => hmac_digest::<Hmac<sha2::Sha256>>(key, base_string)?,
    };
    Ok(base64::engine::general_purpose::STANDARD.encode(digest))
}

fn hmac_digest<M: Mac + hmac::digest::KeyInit>(
    key: &str,
    message: &str,
) -> Result<Vec<u8>, LaunchError> {
    let mut mac = <M as hmac::digest::KeyInit>::new_from_slice(key.as_bytes())
        .map_err(|e| LaunchError::MisconfiguredCredential(format!("unusable HMAC key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Signature the request should carry under `consumer_secret`. LTI 1.x has no token secret.
pub fn compute_signature(
    request: &LaunchRequest,
    consumer_secret: &str,
    method: SignatureMethod,
) -> Result<String, LaunchError> {
    let base = signature_base_string(request)?;
    sign_base_string(method, &signing_key(consumer_secret, ""), &base)
}

/// Consumer side: add the OAuth protocol parameters and the signature to `request`.
pub fn sign_request(
    request: &mut LaunchRequest,
    credential: &ConsumerCredential,
    method: SignatureMethod,
    nonce: &str,
    timestamp: u64,
) -> Result<(), LaunchError> {
    if !credential.is_configured() {
        return Err(LaunchError::MisconfiguredCredential(
            "consumer key and secret are required to sign".to_string(),
        ));
    }
    request.set_param(OAUTH_CONSUMER_KEY, credential.key.as_str());
    request.set_param(OAUTH_SIGNATURE_METHOD, method.as_str());
    request.set_param(OAUTH_TIMESTAMP, timestamp.to_string());
    request.set_param(OAUTH_NONCE, nonce);
    request.set_param(OAUTH_VERSION, "1.0");
    if request.param(OAUTH_CALLBACK).is_none() {
        request.set_param(OAUTH_CALLBACK, "about:blank");
    }
    request.remove_param(OAUTH_SIGNATURE);

    let signature = compute_signature(request, &credential.secret, method)?;
    request.set_param(OAUTH_SIGNATURE, signature);
    Ok(())
}
