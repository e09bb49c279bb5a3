use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use lti_api::{LtiError, SecretStore};

/// Reads secrets from the process environment.
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, name: &str) -> Result<String, LtiError> {
        std::env::var(name)
            .map_err(|_| LtiError::NotFound(format!("missing secret env var {name}")))
    }
}

/// Values parsed from a dotenv file.
#[derive(Debug, Clone, Default)]
pub struct DotEnvStore {
    values: BTreeMap<String, String>,
}

impl DotEnvStore {
    /// Parse dotenv text. A line that is not `KEY=value`, a comment or blank
    /// is an error naming the offending line.
    pub fn parse(content: &str) -> Result<Self, LtiError> {
        Self::collect(dotenvy::from_read_iter(content.as_bytes()), "dotenv input")
    }

    /// A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, LtiError> {
        match dotenvy::from_path_iter(path) {
            Ok(iter) => Self::collect(iter, &path.display().to_string()),
            Err(e) if e.not_found() => Ok(Self::default()),
            Err(e) => Err(LtiError::Internal(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    fn collect<R: Read>(iter: dotenvy::Iter<R>, origin: &str) -> Result<Self, LtiError> {
        let values = iter
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map_err(|e| LtiError::Validation(format!("invalid dotenv in {origin}: {e}")))?;
        Ok(Self { values })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SecretStore for DotEnvStore {
    fn get(&self, name: &str) -> Result<String, LtiError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| LtiError::NotFound(format!("{name} not set in .env")))
    }
}

/// Consults each store in order; the first one holding a value wins.
pub struct LayeredSecretStore {
    layers: Vec<Box<dyn SecretStore>>,
}

impl LayeredSecretStore {
    pub fn new(layers: Vec<Box<dyn SecretStore>>) -> Self {
        Self { layers }
    }

    /// Process environment over the `.env` file in `dir`.
    pub fn env_then_dotenv(dir: &Path) -> Result<Self, LtiError> {
        let dotenv = DotEnvStore::load(&dir.join(crate::ENV_FILE))?;
        Ok(Self::new(vec![Box::new(EnvSecretStore), Box::new(dotenv)]))
    }
}

impl SecretStore for LayeredSecretStore {
    fn get(&self, name: &str) -> Result<String, LtiError> {
        for layer in &self.layers {
            match layer.get(name) {
                Ok(v) => return Ok(v),
                Err(LtiError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Err(LtiError::NotFound(format!("secret {name} is not set")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_parsing() {
        let store = DotEnvStore::parse(
            "# comment\n\
             CONSUMER_KEY=canvas\n\
             export CONSUMER_SECRET=\"with spaces\"\n\
             JWT_SECRET='single'\n\
             EMPTY=\n",
        )
        .unwrap();
        assert_eq!(store.get("CONSUMER_KEY").unwrap(), "canvas");
        assert_eq!(store.get("CONSUMER_SECRET").unwrap(), "with spaces");
        assert_eq!(store.get("JWT_SECRET").unwrap(), "single");
        assert_eq!(store.get("EMPTY").unwrap(), "");
        assert!(matches!(store.get("MISSING"), Err(LtiError::NotFound(_))));
    }

    #[test]
    fn dotenv_garbage_line_is_reported() {
        let err = DotEnvStore::parse("CONSUMER_KEY=canvas\ngarbage line\n").unwrap_err();
        assert!(matches!(err, LtiError::Validation(_)));
    }

    #[test]
    fn dotenv_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "JWT_SECRET=from-file\n").unwrap();
        let store = DotEnvStore::load(&path).unwrap();
        assert_eq!(store.get("JWT_SECRET").unwrap(), "from-file");
    }

    #[test]
    fn missing_dotenv_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DotEnvStore::load(&dir.path().join(".env")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn first_layer_wins() {
        let store = LayeredSecretStore::new(vec![
            Box::new(DotEnvStore::parse("A=top").unwrap()),
            Box::new(DotEnvStore::parse("A=bottom\nB=only-bottom").unwrap()),
        ]);
        assert_eq!(store.get("A").unwrap(), "top");
        assert_eq!(store.get("B").unwrap(), "only-bottom");
        assert!(matches!(store.get("C"), Err(LtiError::NotFound(_))));
    }
}
