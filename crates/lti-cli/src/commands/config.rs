use std::fs;
use std::path::Path;

use anyhow::ensure;
use clap::Subcommand;
use lti_api::redacted;
use lti_core::{
    CONFIG_FILE, ToolConfig, validate_config, write_config_file, write_default_config_file,
};

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Load the configuration and report what is missing
    Check,
}

pub fn cmd_init(cfg_dir: &Path, force: bool, with_secrets: bool, json: bool) -> anyhow::Result<()> {
    let path = cfg_dir.join(CONFIG_FILE);
    if force && path.exists() {
        fs::remove_file(&path)?;
    }

    let written = if with_secrets {
        ensure!(
            !path.exists(),
            "{} already exists (use --force to replace it)",
            path.display()
        );
        let mut config = ToolConfig::default();
        config.consumer.key = prompt_visible("Consumer key: ")?;
        config.consumer.secret = prompt_secret("Consumer secret (hidden): ")?;
        config.token.signing_secret = prompt_secret("Token signing secret (hidden): ")?;
        write_config_file(cfg_dir, &config)?
    } else {
        write_default_config_file(cfg_dir)?
    };

    crate::pout(
        json,
        serde_json::json!({"message": "init complete", "config_file": written}),
        &format!("Init complete: {}", written.display()),
    )
}

pub fn cmd_config(command: ConfigCommands, cfg_dir: &Path, json: bool) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Check => {
            let config = crate::load_tool_config(cfg_dir)?;
            let problem = validate_config(&config).err().map(|e| e.to_string());
            let skew = config
                .launch
                .max_timestamp_skew
                .map_or(0, |d| d.as_secs());

            let value = serde_json::json!({
                "ok": problem.is_none(),
                "config_file": cfg_dir.join(CONFIG_FILE),
                "consumer_key": config.consumer.key,
                "consumer_secret": redacted(&config.consumer.secret),
                "signing_secret": redacted(&config.token.signing_secret),
                "token_ttl_seconds": config.token.ttl.as_secs(),
                "max_timestamp_skew_seconds": skew,
                "require_lti_parameters": config.launch.require_lti_parameters,
                "error": problem,
            });
            let text = format!(
                "config file:      {}\n\
                 consumer key:     {}\n\
                 consumer secret:  {}\n\
                 signing secret:   {}\n\
                 token ttl:        {}s\n\
                 timestamp window: {}\n\
                 lti parameters:   {}",
                cfg_dir.join(CONFIG_FILE).display(),
                if config.consumer.key.is_empty() { "(unset)" } else { config.consumer.key.as_str() },
                redacted(&config.consumer.secret),
                redacted(&config.token.signing_secret),
                config.token.ttl.as_secs(),
                if skew == 0 { "disabled".to_string() } else { format!("{skew}s") },
                if config.launch.require_lti_parameters { "required" } else { "optional" },
            );
            crate::pout(json, value, &text)?;

            match problem {
                Some(p) => anyhow::bail!("Configuration is incomplete: {p}"),
                None => Ok(()),
            }
        }
    }
}

fn prompt_visible(label: &str) -> anyhow::Result<String> {
    use std::io::Write;

    eprint!("{label}");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let value = line.trim().to_string();
    ensure!(!value.is_empty(), "Value cannot be empty");
    Ok(value)
}

fn prompt_secret(label: &str) -> anyhow::Result<String> {
    let value = rpassword::prompt_password(label)?;
    ensure!(!value.trim().is_empty(), "Value cannot be empty");
    Ok(value.trim().to_string())
}
