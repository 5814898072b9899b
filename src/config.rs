use crate::core::rule::DEFAULT_MAX_RULES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/personal-firewall/config.json";
const CONFIG_ENV: &str = "PFW_CONFIG";

/// Application configuration
///
/// Every field falls back to its default when absent, so a partial file is
/// valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rules_file: PathBuf,
    /// Directory that receives timestamped backups
    pub backup_dir: PathBuf,
    pub max_rules: usize,
    /// Binary used as the filter engine (e.g. `iptables-legacy`)
    pub iptables_command: String,
    pub audit_log: PathBuf,
    pub audit_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules_file: PathBuf::from("/etc/personal-firewall/rules.txt"),
            backup_dir: PathBuf::from("/etc/personal-firewall"),
            max_rules: DEFAULT_MAX_RULES,
            iptables_command: "iptables".to_string(),
            audit_log: PathBuf::from("/var/log/personal-firewall.log"),
            audit_enabled: true,
        }
    }
}

/// Resolves the config file: explicit path, then `PFW_CONFIG`, then the
/// system default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    std::env::var_os(CONFIG_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Loads the config from `path`, or returns default if not found.
///
/// An unreadable or malformed file also yields the defaults, with a warning.
pub async fn load_config(path: &Path) -> AppConfig {
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AppConfig::default(),
        Err(e) => {
            warn!("Cannot read config {}: {e}; using defaults", path.display());
            return AppConfig::default();
        }
    };

    match serde_json::from_str::<AppConfig>(&json) {
        Ok(config) => config,
        Err(e) => {
            warn!("Invalid config {}: {e}; using defaults", path.display());
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_helpers::env_guard;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("config.json")).await;
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.max_rules, 1000);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"max_rules": 5, "iptables_command": "iptables-legacy"}"#,
        )
        .unwrap();

        let config = load_config(&path).await;
        assert_eq!(config.max_rules, 5);
        assert_eq!(config.iptables_command, "iptables-legacy");
        assert_eq!(config.rules_file, AppConfig::default().rules_file);
        assert!(config.audit_enabled);
    }

    #[tokio::test]
    async fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config(&path).await, AppConfig::default());
    }

    #[test]
    fn test_config_path_resolution() {
        let _guard = env_guard();

        let explicit = Path::new("/tmp/explicit.json");
        assert_eq!(config_path(Some(explicit)), explicit);

        unsafe {
            std::env::set_var(CONFIG_ENV, "/tmp/from-env.json");
        }
        let from_env = config_path(None);
        unsafe {
            std::env::remove_var(CONFIG_ENV);
        }
        assert_eq!(from_env, Path::new("/tmp/from-env.json"));

        assert_eq!(config_path(None), Path::new(DEFAULT_CONFIG_PATH));
    }
}
