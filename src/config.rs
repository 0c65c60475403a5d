//! Run configuration, read from a TOML file

use crate::metrics::{AlgorithmProvider, BuiltinProvider, DisabledProvider, ExternalProvider, PageRankParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// File looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "synesis-graph.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: PathBuf,
    /// Clear the store inside the sync transaction before applying a run
    pub replace: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            replace: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvancedMode {
    #[default]
    Builtin,
    External,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub advanced: AdvancedMode,
    /// Bound on probe plus computation
    pub timeout_secs: u64,
    pub external_command: Option<String>,
    pub external_args: Vec<String>,
    pub pagerank: PageRankConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            advanced: AdvancedMode::Builtin,
            timeout_secs: 30,
            external_command: None,
            external_args: Vec::new(),
            pagerank: PageRankConfig::default(),
        }
    }
}

impl MetricsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The algorithm provider this configuration selects
    pub fn provider(&self) -> Arc<dyn AlgorithmProvider> {
        match (self.advanced, &self.external_command) {
            (AdvancedMode::Builtin, _) => Arc::new(BuiltinProvider::new(self.pagerank.params())),
            (AdvancedMode::External, Some(command)) => {
                Arc::new(ExternalProvider::new(command.clone(), self.external_args.clone()))
            }
            // validate() rejects external without a command
            (AdvancedMode::External, None) | (AdvancedMode::Disabled, _) => Arc::new(DisabledProvider),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        let p = PageRankParams::default();
        Self {
            damping: p.damping,
            max_iterations: p.max_iterations,
            tolerance: p.tolerance,
        }
    }
}

impl PageRankConfig {
    pub fn params(&self) -> PageRankParams {
        PageRankParams {
            damping: self.damping,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `explicit` if given (it must exist), else the default file in
    /// the working directory if present, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store.path is empty".to_string()));
        }
        if self.metrics.advanced == AdvancedMode::External && self.metrics.external_command.is_none() {
            return Err(ConfigError::Invalid(
                "metrics.advanced = \"external\" requires metrics.external_command".to_string(),
            ));
        }
        if self.metrics.timeout_secs == 0 {
            return Err(ConfigError::Invalid("metrics.timeout_secs must be positive".to_string()));
        }
        let pr = &self.metrics.pagerank;
        if !(0.0..1.0).contains(&pr.damping) {
            return Err(ConfigError::Invalid(format!(
                "metrics.pagerank.damping must be in [0, 1), got {}",
                pr.damping
            )));
        }
        if pr.max_iterations == 0 || pr.tolerance <= 0.0 {
            return Err(ConfigError::Invalid(
                "metrics.pagerank needs positive max_iterations and tolerance".to_string(),
            ));
        }
        Ok(())
    }
}

/// `<data dir>/synesis-graph/graph.db`, or `graph.db` when the platform has
/// no data directory
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("synesis-graph"))
        .unwrap_or_default()
        .join("graph.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.metrics.advanced, AdvancedMode::Builtin);
        assert_eq!(config.metrics.timeout(), Duration::from_secs(30));
        assert!(config.store.path.ends_with("graph.db"));
    }

    #[test]
    fn full_file_is_parsed() {
        let config = Config::from_toml_str(
            r#"
            [store]
            path = "corpus.db"
            replace = true

            [metrics]
            advanced = "external"
            timeout_secs = 5
            external_command = "graph-algos"
            external_args = ["--json"]

            [metrics.pagerank]
            damping = 0.9
            "#,
        )
        .unwrap();

        assert_eq!(config.store.path, PathBuf::from("corpus.db"));
        assert!(config.store.replace);
        assert_eq!(config.metrics.advanced, AdvancedMode::External);
        assert_eq!(config.metrics.external_args, vec!["--json".to_string()]);
        assert_eq!(config.metrics.pagerank.damping, 0.9);
        assert_eq!(config.metrics.pagerank.max_iterations, 50);
    }

    #[test]
    fn external_without_command_is_invalid() {
        let err = Config::from_toml_str("[metrics]\nadvanced = \"external\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_mode_is_a_parse_error() {
        let err = Config::from_toml_str("[metrics]\nadvanced = \"gds\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn bad_damping_is_invalid() {
        let err = Config::from_toml_str("[metrics.pagerank]\ndamping = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(ConfigError::Io { .. })));

        let path = dir.path().join("synesis-graph.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[store]\npath = \"x.db\"").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().store.path, PathBuf::from("x.db"));
    }
}
