//! Environment variables from `.env` and the process
//!
//! Compose reads the same `.env` file, so secrets such as
//! `SQLSERVER_SA_PASSWORD` are looked up here rather than in the TOML
//! settings. Process variables override file values.

use crate::utils::ConfigError;
use std::collections::BTreeMap;
use std::path::Path;

/// Variables the stack expects to be set
pub const REQUIRED_VARS: &[&str] = &[
    "LOCAL_BACKEND_BOOTSTRAP_PASSWORD",
    "SQLSERVER_SA_PASSWORD",
    "KIBANA_ENCRYPTION_KEY",
];

/// Variables that change behaviour when present
pub const OPTIONAL_VARS: &[&str] = &[
    "REGISTRY_PREFIX",
    "IMAGE_TAG",
    "KAFKA_KEYSTORE_PASSWORD",
    "REGISTRY_USERNAME",
    "REGISTRY_PASSWORD",
];

#[derive(Debug, Clone, Default)]
pub struct Environment {
    file_vars: BTreeMap<String, String>,
    use_process: bool,
}

impl Environment {
    /// Load `path` (if it exists) and overlay the process environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut file_vars = BTreeMap::new();

        if path.exists() {
            tracing::debug!("Loading environment from {}", path.display());
            let iter = dotenvy::from_path_iter(path).map_err(|e| ConfigError::EnvFile {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            for item in iter {
                let (key, value) = item.map_err(|e| ConfigError::EnvFile {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                file_vars.insert(key, value);
            }
        }

        Ok(Self {
            file_vars,
            use_process: true,
        })
    }

    /// Build an environment from fixed pairs, ignoring the process
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            file_vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            use_process: false,
        }
    }

    /// Look up a variable; empty values count as unset
    pub fn get(&self, key: &str) -> Option<String> {
        let from_process = if self.use_process {
            std::env::var(key).ok()
        } else {
            None
        };

        from_process
            .or_else(|| self.file_vars.get(key).cloned())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingRequired {
            key: key.to_string(),
        })
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether the value came from the `.env` file
    pub fn defined_in_file(&self, key: &str) -> bool {
        self.file_vars.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_pairs() {
        let env = Environment::from_pairs([("A", "1"), ("EMPTY", "")]);
        assert_eq!(env.get("A").as_deref(), Some("1"));
        assert!(env.get("EMPTY").is_none());
        assert!(env.require("MISSING").is_err());
    }

    #[test]
    fn test_load_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "STACK_DOCTOR_TEST_ONLY_VAR=\"from file\"").unwrap();
        writeln!(file, "IMAGE_TAG_FOR_TEST=1.2.3").unwrap();

        let env = Environment::load(file.path()).unwrap();
        assert_eq!(
            env.get("STACK_DOCTOR_TEST_ONLY_VAR").as_deref(),
            Some("from file")
        );
        assert!(env.defined_in_file("IMAGE_TAG_FOR_TEST"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let env = Environment::load(Path::new("/nonexistent/.env")).unwrap();
        assert!(!env.defined_in_file("ANYTHING"));
    }
}
