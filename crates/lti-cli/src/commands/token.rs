use std::path::Path;

use lti_auth::TokenVerifier;

pub fn cmd_validate(token: Option<String>, cfg_dir: &Path, json: bool) -> anyhow::Result<()> {
    let config = crate::load_tool_config(cfg_dir)?;
    let token = match token {
        Some(t) => t,
        None => super::read_input(None)?,
    };

    let validation = TokenVerifier::from_policy(&config.token)?.validate(token.trim());

    let text = match (&validation.claims, &validation.error) {
        (Some(claims), _) => claims
            .to_display_pairs()
            .into_iter()
            .map(|(name, value)| format!("{name:<13} {value}"))
            .collect::<Vec<_>>()
            .join("\n"),
        (None, Some(error)) => format!("invalid: {error}"),
        (None, None) => "invalid".to_string(),
    };
    crate::pout(json, serde_json::to_value(&validation)?, &text)?;

    if !validation.valid {
        anyhow::bail!("Token rejected");
    }
    Ok(())
}
