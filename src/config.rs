//! Typed node configuration.
//!
//! The config file is TOML with one table per node:
//!
//! ```toml
//! [lab1]
//! addr = "10.0.0.5"
//! user = "admin"
//! passwd = "secret"
//! default_interface = "eth0"
//! interfaces = ["eth0", "eth1"]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable pointing at an alternate config file.
pub const CONF_ENV_VAR: &str = "IMPAIRCTL_CONF";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found (tried --conf, $IMPAIRCTL_CONF, ~/.impairctl.toml, ./impairctl.toml)")]
    NotFound,
    #[error("cannot read config file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(#[from] toml::de::Error),
    #[error("node '{0}' has no section in the config file")]
    MissingNodeSection(String),
    #[error("node '{node}' lists invalid interface name '{name}'")]
    InvalidInterfaceName { node: String, name: String },
}

/// One remote target as declared in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub addr: String,
    pub user: String,
    pub passwd: String,
    pub default_interface: String,
    pub interfaces: Vec<String>,
}

/// The full node map, keyed by node name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Config {
    pub nodes: BTreeMap<String, Node>,
}

impl Config {
    /// Parse config text, collapsing duplicate interface names (declaration
    /// order kept) and rejecting names outside `[A-Za-z0-9_-]+`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(text)?;
        for (name, node) in &mut config.nodes {
            dedup_in_order(&mut node.interfaces);
            for interface in &node.interfaces {
                if !is_interface_name(interface) {
                    return Err(ConfigError::InvalidInterfaceName {
                        node: name.clone(),
                        name: interface.clone(),
                    });
                }
            }
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Locate and load the config file. Search order: the explicit path,
    /// `$IMPAIRCTL_CONF`, `~/.impairctl.toml`, `./impairctl.toml`.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = env::var(CONF_ENV_VAR) {
            return Self::load(Path::new(&path));
        }
        if let Ok(home) = env::var("HOME") {
            let path = Path::new(&home).join(".impairctl.toml");
            if path.exists() {
                return Self::load(&path);
            }
        }
        let cwd = Path::new("impairctl.toml");
        if cwd.exists() {
            return Self::load(cwd);
        }
        Err(ConfigError::NotFound)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }
}

/// Interface names are `[A-Za-z0-9_-]+` tokens.
fn is_interface_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn dedup_in_order(list: &mut Vec<String>) {
    let mut seen = HashSet::new();
    list.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"
[lab1]
addr = "10.0.0.5"
user = "admin"
passwd = "secret"
default_interface = "eth0"
interfaces = ["eth0", "eth1", "eth0"]

[lab2]
addr = "10.0.0.6:2222"
user = "root"
passwd = "hunter2"
default_interface = "ens3"
interfaces = ["ens3"]
"#;

    #[test]
    fn test_parse_and_dedup() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.node_names().collect::<Vec<_>>(), ["lab1", "lab2"]);

        let lab1 = config.node("lab1").unwrap();
        assert_eq!(lab1.addr, "10.0.0.5");
        assert_eq!(lab1.default_interface, "eth0");
        // duplicate collapsed, declaration order kept
        assert_eq!(lab1.interfaces, ["eth0", "eth1"]);

        assert!(config.node("lab3").is_none());
    }

    #[test]
    fn test_missing_field_is_invalid() {
        let text = r#"
[lab1]
addr = "10.0.0.5"
user = "admin"
"#;
        assert!(matches!(Config::parse(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_interface_name_rejected() {
        let text = r#"
[lab1]
addr = "10.0.0.5"
user = "admin"
passwd = "secret"
default_interface = "eth0"
interfaces = ["eth0", "eth 1"]
"#;
        assert!(matches!(
            Config::parse(text),
            Err(ConfigError::InvalidInterfaceName { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.node("lab2").is_some());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load(Path::new("/nonexistent/impairctl.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_discover_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::discover(Some(file.path())).unwrap();
        assert!(config.node("lab1").is_some());
    }
}
