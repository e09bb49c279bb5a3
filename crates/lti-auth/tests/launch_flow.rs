use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lti_api::{
    ClaimField, ConsumerCredential, DEFAULT_TOKEN_TTL, LaunchPolicy, LaunchRequest, NOT_AVAILABLE,
};
use lti_auth::{
    LaunchError, LaunchVerifier, SignatureMethod, TokenError, TokenIssuer, TokenVerifier,
    encode_form_body, issue, parse_form_request, sign_request, verify, verify_token,
};

const LAUNCH_URL: &str = "https://tool.example/lti/launch";
const SIGNING_SECRET: &str = "session-signing-secret";

fn credential() -> ConsumerCredential {
    ConsumerCredential::new("canvas-key", "canvas-secret")
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Form body a consumer would POST for the Jane Doe launch.
fn signed_body(timestamp: u64) -> String {
    let mut request = LaunchRequest::new("POST", LAUNCH_URL)
        .with_param("lti_message_type", "basic-lti-launch-request")
        .with_param("lti_version", "LTI-1p0")
        .with_param("resource_link_id", "assignment-7")
        .with_param("user_id", "42")
        .with_param("lis_person_name_full", "Jane Doe")
        .with_param("context_id", "CS101");
    sign_request(
        &mut request,
        &credential(),
        SignatureMethod::HmacSha1,
        "f0e1d2c3",
        timestamp,
    )
    .unwrap();
    encode_form_body(&request.params)
}

#[test]
fn jane_doe_launch_yields_token_with_claims() {
    let body = signed_body(now_secs());
    let request = parse_form_request("POST", LAUNCH_URL, &body).unwrap();

    let launch = verify(request, &credential()).unwrap();
    let issued = issue(&launch, SIGNING_SECRET, DEFAULT_TOKEN_TTL).unwrap();
    let claims = verify_token(issued.token.as_str(), SIGNING_SECRET).unwrap();

    assert_eq!(claims, launch.claims());
    assert_eq!(claims.display(ClaimField::UserId), "42");
    assert_eq!(claims.display(ClaimField::FullName), "Jane Doe");
    assert_eq!(claims.display(ClaimField::ContextId), "CS101");
    assert_eq!(claims.display(ClaimField::Email), NOT_AVAILABLE);
    assert_eq!(claims.display(ClaimField::Roles), NOT_AVAILABLE);
    assert_eq!(claims.display(ClaimField::ContextTitle), NOT_AVAILABLE);
}

#[test]
fn altered_signature_is_rejected_before_any_token() {
    let body = signed_body(now_secs());
    let mut request = parse_form_request("POST", LAUNCH_URL, &body).unwrap();
    let signature = request.param("oauth_signature").unwrap().to_string();
    let mut altered = signature.into_bytes();
    altered[0] = if altered[0] == b'x' { b'y' } else { b'x' };
    request.set_param("oauth_signature", String::from_utf8(altered).unwrap());

    let err = verify(request, &credential()).unwrap_err();
    assert_eq!(err, LaunchError::SignatureMismatch);
    assert!(!err.is_misconfiguration());
}

#[test]
fn token_presented_25_hours_later_is_expired() {
    let issued_at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let verifier = LaunchVerifier::new(credential(), LaunchPolicy::default());
    let body = signed_body(1_700_000_000);
    let request = parse_form_request("POST", LAUNCH_URL, &body).unwrap();
    let launch = verifier.verify_at(request, issued_at).unwrap();

    let issued = TokenIssuer::new(SIGNING_SECRET, DEFAULT_TOKEN_TTL)
        .unwrap()
        .issue_claims_at(launch.claims(), issued_at)
        .unwrap();

    let later = issued_at + Duration::from_secs(25 * 3600);
    let err = TokenVerifier::new(SIGNING_SECRET)
        .unwrap()
        .verify_at(issued.token.as_str(), later)
        .unwrap_err();
    assert!(matches!(err, TokenError::Expired { .. }));
}

#[test]
fn issued_token_is_transport_safe() {
    let body = signed_body(now_secs());
    let request = parse_form_request("POST", LAUNCH_URL, &body).unwrap();
    let launch = verify(request, &credential()).unwrap();
    let issued = issue(&launch, SIGNING_SECRET, DEFAULT_TOKEN_TTL).unwrap();

    assert!(
        issued
            .token
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
    );
}

#[test]
fn missing_consumer_secret_never_verifies() {
    let body = signed_body(now_secs());
    let request = parse_form_request("POST", LAUNCH_URL, &body).unwrap();
    let err = verify(request, &ConsumerCredential::new("canvas-key", "")).unwrap_err();
    assert!(err.is_misconfiguration());
}

#[test]
fn verifiers_share_across_threads() {
    let verifier = std::sync::Arc::new(LaunchVerifier::new(credential(), LaunchPolicy::default()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let verifier = verifier.clone();
            std::thread::spawn(move || {
                let body = signed_body(now_secs());
                let request = parse_form_request("POST", LAUNCH_URL, &body).unwrap();
                verifier.verify(request).is_ok()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
