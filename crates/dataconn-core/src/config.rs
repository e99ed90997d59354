//! Backend configuration.
//!
//! A backend is configured by a flat key-value mapping such as
//! `{driver, location}` for file-based backends or
//! `{driver, host, port, dbuser, dbpass, dbname}` for servers. The mapping
//! is usually read from a YAML document:
//!
//! ```yaml
//! driver: sqlite3
//! location: ~/.local/share/app/data.db
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Flat configuration mapping consumed by drivers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: BTreeMap<String, String>,
}

impl Configuration {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for a driver storing its data at `location`.
    pub fn for_driver(driver: impl Into<String>, location: impl AsRef<Path>) -> Self {
        Self::new()
            .with("driver", driver)
            .with("location", location.as_ref().to_string_lossy())
    }

    /// Set a key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Parse a YAML mapping. Scalar values of any type are kept as text.
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(source)?;
        let mut values = BTreeMap::new();
        for (key, value) in raw {
            let text = match value {
                serde_yaml::Value::Null => continue,
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::String(s) => s,
                other => {
                    return Err(Error::DataFormatting(format!(
                        "configuration key '{}' must be a scalar, got {:?}",
                        key, other
                    )))
                }
            };
            values.insert(key, text);
        }
        Ok(Self { values })
    }

    /// Read a YAML configuration file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    /// Get a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a key a driver cannot work without.
    pub fn require(&self, driver: &str, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| Error::InsufficientConfiguration {
            driver: driver.to_string(),
            key: key.to_string(),
        })
    }

    /// The configured driver name.
    pub fn driver(&self) -> Result<&str> {
        self.require("<unset>", "driver")
    }

    /// The `location` key as a path, with a leading `~` expanded.
    pub fn location(&self, driver: &str) -> Result<PathBuf> {
        let raw = self.require(driver, "location")?;
        Ok(expand_home(raw))
    }

    /// Parse an optional numeric key.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| {
                Error::DataFormatting(format!("configuration key '{}' is not a number: {}", key, raw))
            }),
        }
    }

    /// Parse an optional boolean key.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|raw| matches!(raw, "true" | "yes" | "1"))
    }
}

fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix('~') {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
            None => PathBuf::from(raw),
        },
        None => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml() {
        let config = Configuration::from_yaml_str(
            "driver: postgresql\nhost: localhost\nport: 5432\ndbuser: aboard\ndebug: true\n",
        )
        .unwrap();
        assert_eq!(config.driver().unwrap(), "postgresql");
        assert_eq!(config.get("port"), Some("5432"));
        assert_eq!(config.get_u64("port").unwrap(), Some(5432));
        assert_eq!(config.get_bool("debug"), Some(true));
        assert_eq!(config.get("dbpass"), None);
    }

    #[test]
    fn test_nested_values_rejected() {
        let err = Configuration::from_yaml_str("driver:\n  name: x\n").unwrap_err();
        assert!(matches!(err, Error::DataFormatting(_)));
    }

    #[test]
    fn test_require_reports_driver_and_key() {
        let config = Configuration::new().with("driver", "yaml");
        match config.location("yaml").unwrap_err() {
            Error::InsufficientConfiguration { driver, key } => {
                assert_eq!(driver, "yaml");
                assert_eq!(key, "location");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_location_expands_home() {
        let config = Configuration::new().with("location", "~/data");
        let path = config.location("yaml").unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path, home.join("data"));
        }

        let config = Configuration::for_driver("sled", "/tmp/db");
        assert_eq!(config.location("sled").unwrap(), PathBuf::from("/tmp/db"));
    }

    #[test]
    fn test_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.yml");
        std::fs::write(&path, "driver: yaml\nlocation: /srv/data\n").unwrap();
        let config = Configuration::read(&path).unwrap();
        assert_eq!(config.driver().unwrap(), "yaml");
    }
}
