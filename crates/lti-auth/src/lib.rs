//! lti-auth
//!
//! Launch authentication for an LTI 1.x tool provider.
//! It covers the path from a signed launch to a trusted session:
//!
//! - **Verifying launches** signed with OAuth 1.0a (HMAC-SHA1/HMAC-SHA256) against the one
//!   registered consumer credential, with constant-time signature comparison
//! - **Extracting identity claims** (user, names, email, roles, course context)
//! - **Issuing and verifying session tokens** (HS256 JWTs with a fixed lifetime)
//!
//! The core API is `LaunchVerifier`, whose `VerifiedLaunch` output is the only input
//! `TokenIssuer` accepts.
//!
//! ## Quick start
//! ```no_run
//! use lti_api::{ConsumerCredential, LaunchPolicy, DEFAULT_TOKEN_TTL};
//! use lti_auth::{LaunchVerifier, TokenIssuer, TokenVerifier, parse_form_request};
//!
//! # fn demo(body: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = LaunchVerifier::new(
//!     ConsumerCredential::new("consumer-key", "consumer-secret"),
//!     LaunchPolicy::default(),
//! );
//! let request = parse_form_request("POST", "https://tool.example/lti/launch", body)?;
//! let launch = verifier.verify(request)?;
//!
//! let issued = TokenIssuer::new("signing-secret", DEFAULT_TOKEN_TTL)?.issue(&launch)?;
//! let claims = TokenVerifier::new("signing-secret")?.verify(issued.token.as_str())?;
//! println!("user={:?}", claims.user_id);
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

pub mod claims;
mod error;
pub mod form;
mod launch;
pub mod oauth;
mod token;

pub use claims::extract_claims;
pub use error::{LaunchError, TokenError, TokenResult};
pub use form::{encode_form_body, parse_form_body, parse_form_request};
pub use launch::{LaunchVerifier, VerificationResult, VerifiedLaunch, verify};
pub use oauth::{SignatureMethod, sign_request};
pub use token::{IssuedToken, SessionToken, TokenIssuer, TokenVerifier, issue, verify_token};
