mod env;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lti_api::{
    ConsumerCredential, DEFAULT_TIMESTAMP_SKEW, DEFAULT_TOKEN_TTL, LaunchPolicy, LtiError,
    MAX_TOKEN_TTL, SecretStore, TokenPolicy,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use env::{DotEnvStore, EnvSecretStore, LayeredSecretStore};

pub const CONFIG_FILE: &str = "lti.toml";
pub const ENV_FILE: &str = ".env";

pub const ENV_CONSUMER_KEY: &str = "CONSUMER_KEY";
pub const ENV_CONSUMER_SECRET: &str = "CONSUMER_SECRET";
pub const ENV_SIGNING_SECRET: &str = "JWT_SECRET";
pub const ENV_TOKEN_TTL: &str = "TOKEN_TTL_SECONDS";

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# LTI launch gateway configuration.
# CONSUMER_KEY, CONSUMER_SECRET, JWT_SECRET and TOKEN_TTL_SECONDS in the
# environment (or a .env file) take precedence over the values below.

[consumer]
key = ""
secret = ""

[token]
signing_secret = ""
ttl_seconds = 86400

[launch]
# 0 disables the oauth_timestamp window.
max_timestamp_skew_seconds = 300
require_lti_parameters = true
"#;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolConfig {
    pub consumer: ConsumerCredential,
    pub token: TokenPolicy,
    pub launch: LaunchPolicy,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    consumer: RawConsumer,
    #[serde(default)]
    token: RawToken,
    #[serde(default)]
    launch: RawLaunch,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawConsumer {
    key: Option<String>,
    secret: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawToken {
    signing_secret: Option<String>,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawLaunch {
    max_timestamp_skew_seconds: Option<u64>,
    require_lti_parameters: Option<bool>,
}

impl From<RawConfig> for ToolConfig {
    fn from(raw: RawConfig) -> Self {
        let skew = raw
            .launch
            .max_timestamp_skew_seconds
            .unwrap_or(DEFAULT_TIMESTAMP_SKEW.as_secs());
        Self {
            consumer: ConsumerCredential::new(
                raw.consumer.key.unwrap_or_default(),
                raw.consumer.secret.unwrap_or_default(),
            ),
            token: TokenPolicy {
                signing_secret: raw.token.signing_secret.unwrap_or_default(),
                ttl: raw
                    .token
                    .ttl_seconds
                    .map_or(DEFAULT_TOKEN_TTL, Duration::from_secs),
            },
            launch: LaunchPolicy {
                max_timestamp_skew: (skew > 0).then(|| Duration::from_secs(skew)),
                require_lti_parameters: raw.launch.require_lti_parameters.unwrap_or(true),
            },
        }
    }
}

impl From<&ToolConfig> for RawConfig {
    fn from(config: &ToolConfig) -> Self {
        Self {
            consumer: RawConsumer {
                key: Some(config.consumer.key.clone()),
                secret: Some(config.consumer.secret.clone()),
            },
            token: RawToken {
                signing_secret: Some(config.token.signing_secret.clone()),
                ttl_seconds: Some(config.token.ttl.as_secs()),
            },
            launch: RawLaunch {
                max_timestamp_skew_seconds: Some(
                    config.launch.max_timestamp_skew.map_or(0, |d| d.as_secs()),
                ),
                require_lti_parameters: Some(config.launch.require_lti_parameters),
            },
        }
    }
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("lti")
    } else {
        PathBuf::from(".lti")
    }
}

pub fn parse_config(content: &str, origin: &str) -> Result<ToolConfig, LtiError> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| LtiError::Validation(format!("invalid TOML in {origin}: {e}")))?;
    Ok(raw.into())
}

pub fn load_config_from_file(path: &Path) -> Result<ToolConfig, LtiError> {
    let content = fs::read_to_string(path)
        .map_err(|e| LtiError::NotFound(format!("failed to read {}: {e}", path.display())))?;
    parse_config(&content, &path.display().to_string())
}

/// Load `<dir>/lti.toml` (defaults when absent) and apply overrides from `secrets`.
///
/// Missing credentials are not an error here; see [`validate_config`].
pub fn load_config(dir: &Path, secrets: &dyn SecretStore) -> Result<ToolConfig, LtiError> {
    let path = dir.join(CONFIG_FILE);
    let mut config = if path.exists() {
        debug!(path = %path.display(), "loading config file");
        load_config_from_file(&path)?
    } else {
        debug!(path = %path.display(), "no config file, using defaults");
        ToolConfig::default()
    };

    apply_overrides(&mut config, secrets)?;

    if !config.consumer.is_configured() {
        warn!("consumer key/secret not configured; every launch will be rejected");
    }
    if config.token.signing_secret.is_empty() {
        warn!("token signing secret not configured; tokens cannot be issued");
    }
    Ok(config)
}

/// Overwrite config values with any non-empty value `secrets` holds.
pub fn apply_overrides(config: &mut ToolConfig, secrets: &dyn SecretStore) -> Result<(), LtiError> {
    if let Some(key) = lookup(secrets, ENV_CONSUMER_KEY)? {
        config.consumer.key = key;
    }
    if let Some(secret) = lookup(secrets, ENV_CONSUMER_SECRET)? {
        config.consumer.secret = secret;
    }
    if let Some(secret) = lookup(secrets, ENV_SIGNING_SECRET)? {
        config.token.signing_secret = secret;
    }
    if let Some(ttl) = lookup(secrets, ENV_TOKEN_TTL)? {
        let seconds: u64 = ttl.trim().parse().map_err(|_| {
            LtiError::Validation(format!("{ENV_TOKEN_TTL} must be a number of seconds, got {ttl:?}"))
        })?;
        config.token.ttl = Duration::from_secs(seconds);
    }
    Ok(())
}

fn lookup(secrets: &dyn SecretStore, name: &str) -> Result<Option<String>, LtiError> {
    match secrets.get(name) {
        Ok(v) if v.is_empty() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(LtiError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn validate_config(config: &ToolConfig) -> Result<(), LtiError> {
    let mut missing = Vec::new();
    if config.consumer.key.trim().is_empty() {
        missing.push("consumer key");
    }
    if config.consumer.secret.is_empty() {
        missing.push("consumer secret");
    }
    if config.token.signing_secret.is_empty() {
        missing.push("token signing secret");
    }
    if !missing.is_empty() {
        return Err(LtiError::Validation(format!(
            "missing {}",
            missing.join(", ")
        )));
    }
    if config.token.ttl.is_zero() {
        return Err(LtiError::Validation(
            "token ttl must be greater than zero".to_string(),
        ));
    }
    if config.token.ttl > MAX_TOKEN_TTL {
        return Err(LtiError::Validation(format!(
            "token ttl of {}s exceeds the maximum of {}s",
            config.token.ttl.as_secs(),
            MAX_TOKEN_TTL.as_secs()
        )));
    }
    Ok(())
}

/// Write the commented config template to `<dir>/lti.toml` unless one exists.
pub fn write_default_config_file(dir: &Path) -> Result<PathBuf, LtiError> {
    fs::create_dir_all(dir)
        .map_err(|e| LtiError::Internal(format!("failed to create {}: {e}", dir.display())))?;

    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        fs::write(&path, DEFAULT_CONFIG_TEMPLATE).map_err(|e| {
            LtiError::Internal(format!("failed to write {}: {e}", path.display()))
        })?;
    }
    Ok(path)
}

/// Write `config` to `<dir>/lti.toml`, replacing any existing file.
pub fn write_config_file(dir: &Path, config: &ToolConfig) -> Result<PathBuf, LtiError> {
    fs::create_dir_all(dir)
        .map_err(|e| LtiError::Internal(format!("failed to create {}: {e}", dir.display())))?;

    let body = toml::to_string_pretty(&RawConfig::from(config))
        .map_err(|e| LtiError::Internal(format!("failed to render config: {e}")))?;
    let path = dir.join(CONFIG_FILE);
    fs::write(&path, body)
        .map_err(|e| LtiError::Internal(format!("failed to write {}: {e}", path.display())))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_secrets() -> DotEnvStore {
        DotEnvStore::default()
    }

    #[test]
    fn template_parses_to_defaults() {
        let config = parse_config(DEFAULT_CONFIG_TEMPLATE, "template").unwrap();
        assert_eq!(config, ToolConfig::default());
    }

    #[test]
    fn file_values_are_read() {
        let config = parse_config(
            r#"
            [consumer]
            key = "canvas"
            secret = "s3cret"

            [token]
            signing_secret = "jwt"
            ttl_seconds = 3600

            [launch]
            max_timestamp_skew_seconds = 0
            require_lti_parameters = false
            "#,
            "inline",
        )
        .unwrap();
        assert_eq!(config.consumer, ConsumerCredential::new("canvas", "s3cret"));
        assert_eq!(config.token.signing_secret, "jwt");
        assert_eq!(config.token.ttl, Duration::from_secs(3600));
        assert_eq!(config.launch.max_timestamp_skew, None);
        assert!(!config.launch.require_lti_parameters);
        validate_config(&config).unwrap();
    }

    #[test]
    fn unknown_keys_and_bad_toml_are_rejected() {
        assert!(matches!(
            parse_config("[consumer]\nkey = 1", "inline"),
            Err(LtiError::Validation(_))
        ));
        assert!(matches!(
            parse_config("[consumer]\nkye = \"x\"", "inline"),
            Err(LtiError::Validation(_))
        ));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path(), &no_secrets()).unwrap();
        assert_eq!(config, ToolConfig::default());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn env_beats_dotenv_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[consumer]\nkey = \"file-key\"\nsecret = \"file-secret\"\n[token]\nsigning_secret = \"file-jwt\"\n",
        )
        .unwrap();

        let secrets = LayeredSecretStore::new(vec![
            Box::new(DotEnvStore::parse("CONSUMER_KEY=env-key").unwrap()),
            Box::new(DotEnvStore::parse(
                "CONSUMER_KEY=dotenv-key\nCONSUMER_SECRET=dotenv-secret\nJWT_SECRET=",
            )
            .unwrap()),
        ]);
        let config = load_config(dir.path(), &secrets).unwrap();

        assert_eq!(config.consumer.key, "env-key");
        assert_eq!(config.consumer.secret, "dotenv-secret");
        assert_eq!(config.token.signing_secret, "file-jwt");
        assert_eq!(config.token.ttl, DEFAULT_TOKEN_TTL);
    }

    #[test]
    fn ttl_override_must_be_numeric() {
        let mut config = ToolConfig::default();
        apply_overrides(&mut config, &DotEnvStore::parse("TOKEN_TTL_SECONDS=60").unwrap()).unwrap();
        assert_eq!(config.token.ttl, Duration::from_secs(60));

        let err = apply_overrides(&mut config, &DotEnvStore::parse("TOKEN_TTL_SECONDS=1d").unwrap())
            .unwrap_err();
        assert!(matches!(err, LtiError::Validation(_)));
    }

    #[test]
    fn validation_names_what_is_missing() {
        let mut config = ToolConfig::default();
        config.consumer.key = "canvas".to_string();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("consumer secret"));
        assert!(err.contains("token signing secret"));
        assert!(!err.contains("consumer key"));

        config.consumer.secret = "s".to_string();
        config.token.signing_secret = "j".to_string();
        config.token.ttl = Duration::ZERO;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn huge_ttl_from_environment_fails_validation() {
        let mut config = ToolConfig {
            consumer: ConsumerCredential::new("k", "s"),
            ..ToolConfig::default()
        };
        config.token.signing_secret = "j".to_string();
        let secrets = DotEnvStore::parse("TOKEN_TTL_SECONDS=18446744073709551615").unwrap();
        apply_overrides(&mut config, &secrets).unwrap();

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum"));
    }

    #[test]
    fn written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToolConfig {
            consumer: ConsumerCredential::new("canvas", "s3cret \"quoted\""),
            token: TokenPolicy {
                signing_secret: "jwt".to_string(),
                ttl: Duration::from_secs(600),
            },
            launch: LaunchPolicy {
                max_timestamp_skew: None,
                require_lti_parameters: false,
            },
        };
        let path = write_config_file(dir.path(), &config).unwrap();
        assert_eq!(load_config_from_file(&path).unwrap(), config);
    }

    #[test]
    fn default_file_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_default_config_file(&dir.path().join("nested")).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG_TEMPLATE);

        fs::write(&path, "[consumer]\nkey = \"kept\"\n").unwrap();
        write_default_config_file(&dir.path().join("nested")).unwrap();
        assert_eq!(load_config_from_file(&path).unwrap().consumer.key, "kept");
    }
}
