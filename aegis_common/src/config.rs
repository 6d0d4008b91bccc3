//! `agent.yml` loading.
//!
//! Parsed at a fixed, cwd-relative path with `serde_yaml` rather than
//! this workspace's usual `toml` loader, since the format is part of
//! the external contract (see DESIGN.md for the rationale).

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::consts::DEFAULT_HEARTBEAT_INTERVAL_S;
use crate::error::ConfigError;

/// Top-level agent configuration, loaded once at startup from
/// `../config/agent.yml` (relative to the process working directory).
///
/// Unknown keys are silently ignored — this struct deliberately omits
/// `#[serde(deny_unknown_fields)]`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    /// Ordered list of module names to supervise. Empty is permitted.
    #[serde(default)]
    pub modules: Vec<String>,

    /// Filesystem path for the log sink. If absent, log to stderr.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Heartbeat tick interval in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
}

fn default_heartbeat_interval() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_S
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            modules: Vec::new(),
            log_path: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL_S,
        }
    }
}

impl AgentConfig {
    /// Load and parse the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `path` does not exist,
    /// [`ConfigError::Io`] for other read failures, and
    /// [`ConfigError::Parse`] for invalid YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let cfg: AgentConfig = serde_yaml::from_str(&content)?;
        Ok(cfg)
    }

    /// Load the config, falling back to an empty-module default and
    /// logging the failure, per spec: "Parse failure is logged; the
    /// supervisor proceeds with an empty module set."
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "failed to load agent config, proceeding with empty module set");
                AgentConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "modules:\n  - hal\n  - cu\nlog_path: /var/log/aegis-agent.log\nheartbeat_interval: 10"
        )
        .unwrap();

        let cfg = AgentConfig::load(&path).unwrap();
        assert_eq!(cfg.modules, vec!["hal".to_string(), "cu".to_string()]);
        assert_eq!(cfg.log_path, Some(PathBuf::from("/var/log/aegis-agent.log")));
        assert_eq!(cfg.heartbeat_interval, 10);
    }

    #[test]
    fn defaults_heartbeat_interval_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yml");
        std::fs::write(&path, "modules: [hal]\n").unwrap();

        let cfg = AgentConfig::load(&path).unwrap();
        assert_eq!(cfg.heartbeat_interval, DEFAULT_HEARTBEAT_INTERVAL_S);
        assert_eq!(cfg.log_path, None);
    }

    #[test]
    fn empty_modules_list_is_permitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yml");
        std::fs::write(&path, "modules: []\n").unwrap();

        let cfg = AgentConfig::load(&path).unwrap();
        assert!(cfg.modules.is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yml");
        std::fs::write(&path, "modules: [hal]\nbogus_key: 42\n").unwrap();

        let cfg = AgentConfig::load(&path).unwrap();
        assert_eq!(cfg.modules, vec!["hal".to_string()]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.yml");
        assert!(matches!(AgentConfig::load(&path), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yml");
        std::fs::write(&path, "modules: [hal\n").unwrap();
        assert!(matches!(AgentConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_or_default_falls_back_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.yml");
        let cfg = AgentConfig::load_or_default(&path);
        assert_eq!(cfg, AgentConfig::default());
    }
}
