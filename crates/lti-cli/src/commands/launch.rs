use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Args;
use lti_api::LaunchRequest;
use lti_auth::{
    LaunchVerifier, SignatureMethod, TokenIssuer, encode_form_body, parse_form_request,
    sign_request,
};
use tracing::info;

#[derive(Debug, Args)]
pub struct SignArgs {
    /// Launch URL the consumer posts to
    #[arg(long)]
    pub url: String,
    #[arg(long, default_value = "POST")]
    pub method: String,
    #[arg(long, default_value_t = SignatureMethod::HmacSha1)]
    pub signature_method: SignatureMethod,
    /// Launch parameter, repeatable
    #[arg(long = "param", value_parser = crate::parse_key_val)]
    pub params: Vec<(String, String)>,
    /// Fixed nonce instead of a random one
    #[arg(long)]
    pub nonce: Option<String>,
    /// Fixed oauth_timestamp (unix seconds) instead of now
    #[arg(long)]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Args)]
pub struct LaunchArgs {
    /// URL the launch was posted to
    #[arg(long)]
    pub url: String,
    #[arg(long, default_value = "POST")]
    pub method: String,
    /// Form-encoded launch body; read from stdin when omitted
    #[arg(long)]
    pub body_file: Option<PathBuf>,
}

pub fn cmd_sign(args: SignArgs, cfg_dir: &Path, json: bool) -> anyhow::Result<()> {
    let config = crate::load_tool_config(cfg_dir)?;

    let mut request = LaunchRequest::new(args.method, args.url);
    for (name, value) in args.params {
        request = request.with_param(name, value);
    }

    let nonce = args
        .nonce
        .unwrap_or_else(|| hex::encode(rand::random::<[u8; 16]>()));
    let timestamp = match args.timestamp {
        Some(ts) => ts,
        None => SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
    };

    sign_request(
        &mut request,
        &config.consumer,
        args.signature_method,
        &nonce,
        timestamp,
    )?;
    let body = encode_form_body(&request.params);

    crate::pout(
        json,
        serde_json::json!({
            "url": request.url,
            "method": request.method,
            "signature": request.param("oauth_signature"),
            "body": body,
        }),
        &body,
    )
}

pub fn cmd_launch(args: LaunchArgs, cfg_dir: &Path, json: bool) -> anyhow::Result<()> {
    let config = crate::load_tool_config(cfg_dir)?;
    let body = super::read_input(args.body_file.as_deref())?;
    let request = parse_form_request(&args.method, &args.url, body.trim_end())?;

    let verifier = LaunchVerifier::new(config.consumer, config.launch);
    let launch = verifier
        .verify(request)
        .map_err(|e| anyhow::anyhow!("Launch rejected ({}): {e}", e.kind()))?;

    let issuer = TokenIssuer::from_policy(&config.token)?;
    let issued = issuer.issue(&launch)?;
    info!(
        consumer = launch.consumer_key(),
        ttl_seconds = issuer.ttl().as_secs(),
        "session token issued"
    );

    let expires_at = issued.expires_at.duration_since(UNIX_EPOCH)?.as_secs();
    let pairs = issued.claims.to_display_pairs();

    let mut text = String::new();
    for (name, value) in &pairs {
        text.push_str(&format!("{name:<13} {value}\n"));
    }
    text.push_str(&format!("{:<13} {expires_at}\n", "expiresAt"));
    text.push_str(&format!("{:<13} {}", "token", issued.token));

    let display: serde_json::Map<String, serde_json::Value> = pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
        .collect();
    crate::pout(
        json,
        serde_json::json!({
            "claims": display,
            "roles": issued.claims.roles(),
            "token": issued.token,
            "expires_at": expires_at,
        }),
        &text,
    )
}
