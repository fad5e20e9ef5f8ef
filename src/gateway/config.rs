//! Read-only view of the gateway's routing configuration.
//!
//! The YAML file is owned by the gateway tool; the panel only reads it,
//! freshly on every dashboard render, and requests mutations through the
//! tool itself.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("routing config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("routing config parse error: {0}")]
    Malformed(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Proxy,
    Service,
}

/// One domain's routing target.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub ip: Option<String>,
}

/// The full routing table, keyed by domain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub domains: BTreeMap<String, RoutingEntry>,
}

impl RoutingConfig {
    /// Entries of one kind, for the dashboard's split listing.
    #[must_use]
    pub fn entries_of(&self, kind: EntryKind) -> BTreeMap<&str, &RoutingEntry> {
        self.domains
            .iter()
            .filter(|(_, entry)| entry.kind == kind)
            .map(|(domain, entry)| (domain.as_str(), entry))
            .collect()
    }
}

/// Loads the routing config from its fixed path on each call.
#[derive(Debug, Clone)]
pub struct RoutingConfigLoader {
    path: PathBuf,
}

impl RoutingConfigLoader {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read and parse the routing table. A missing or empty file is an
    /// empty table, not an error.
    ///
    /// # Errors
    /// I/O failures other than absence, or malformed YAML.
    pub fn load(&self) -> Result<RoutingConfig, ConfigError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RoutingConfig::default())
            }
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(RoutingConfig::default());
        }
        Ok(serde_yaml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, RoutingConfigLoader) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flowgate.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, RoutingConfigLoader::new(path))
    }

    #[test]
    fn missing_file_is_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let loader = RoutingConfigLoader::new(dir.path().join("absent.yaml"));
        let config = loader.load().unwrap();
        assert!(config.domains.is_empty());
    }

    #[test]
    fn empty_file_is_an_empty_table() {
        let (_dir, loader) = write_config("");
        assert!(loader.load().unwrap().domains.is_empty());
    }

    #[test]
    fn parses_proxy_and_service_entries() {
        let (_dir, loader) = write_config(
            "domains:\n  app.example.com:\n    type: proxy\n  api.example.com:\n    type: service\n    port: 8080\n    ip: 10.0.0.5\n",
        );
        let config = loader.load().unwrap();
        assert_eq!(config.domains.len(), 2);

        let proxies = config.entries_of(EntryKind::Proxy);
        assert!(proxies.contains_key("app.example.com"));

        let services = config.entries_of(EntryKind::Service);
        let api = services.get("api.example.com").unwrap();
        assert_eq!(api.port, Some(8080));
        assert_eq!(api.ip.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let (_dir, loader) = write_config("domains: [not: a: mapping");
        assert!(matches!(loader.load(), Err(ConfigError::Malformed(_))));
    }
}
