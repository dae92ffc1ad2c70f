//! Layered configuration for the service desk.
//!
//! Values are resolved in this order, later layers winning:
//! built-in defaults → `.desk/desk.toml` (or `--config <path>`) → environment
//! variables → command-line flags. `.env` files are loaded into the
//! environment by `main` before any of this runs.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! port = 5000
//! host = "127.0.0.1"
//! db_path = ".desk/service_desk.db"
//! cors_permissive = false
//!
//! [tracker]
//! api_url = "https://gitlab.com/api/v4"
//! project_id = "75469260"
//! token = "glpat-..."
//! mirror_updates = false
//!
//! [client]
//! api_url = "http://localhost:5000/api"
//! ```
//!
//! # Environment
//!
//! | Variable                | Overrides                  |
//! |-------------------------|----------------------------|
//! | `PORT`                  | `server.port`              |
//! | `HOST`                  | `server.host`              |
//! | `DB_PATH`               | `server.db_path`           |
//! | `DB_NAME`               | `server.db_path` as `.desk/<name>.db` (ignored when `DB_PATH` is set) |
//! | `GITLAB_API_URL`        | `tracker.api_url`          |
//! | `GITLAB_PROJECT_ID`     | `tracker.project_id`       |
//! | `GITLAB_TOKEN`          | `tracker.token`            |
//! | `GITLAB_MIRROR_UPDATES` | `tracker.mirror_updates`   |
//! | `DESK_API_URL`          | `client.api_url`           |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::desk::gitlab::{DEFAULT_API_URL, DEFAULT_PROJECT_ID};

/// Directory holding the database and config file by default.
pub const DESK_DIR: &str = ".desk";
pub const CONFIG_FILE: &str = "desk.toml";

/// HTTP server and storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Allow any origin, for a browser front-end served from
    /// another port.
    #[serde(default)]
    pub cors_permissive: bool,
}

fn default_port() -> u16 {
    5000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_db_path() -> PathBuf {
    Path::new(DESK_DIR).join("service_desk.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            db_path: default_db_path(),
            cors_permissive: false,
        }
    }
}

/// GitLab mirror settings. Without a token the mirror is disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSection {
    #[serde(default = "default_tracker_url")]
    pub api_url: String,
    #[serde(default = "default_project_id")]
    pub project_id: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Also mirror status/title/description edits, not only creates and
    /// comments.
    #[serde(default)]
    pub mirror_updates: bool,
}

fn default_tracker_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_project_id() -> String {
    DEFAULT_PROJECT_ID.to_string()
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            api_url: default_tracker_url(),
            project_id: default_project_id(),
            token: None,
            mirror_updates: false,
        }
    }
}

impl TrackerSection {
    pub fn is_configured(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Settings for the `desk tickets` client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_client_api_url")]
    pub api_url: String,
}

fn default_client_api_url() -> String {
    "http://localhost:5000/api".to_string()
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            api_url: default_client_api_url(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeskConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub client: ClientSection,
}

impl DeskConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse desk.toml")
    }

    /// Load `<desk_dir>/desk.toml`, or defaults when it does not exist.
    pub fn load_or_default(desk_dir: &Path) -> Result<Self> {
        let config_path = desk_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// File layer then environment layer. An explicit `config_path` must
    /// exist; the default location is optional.
    pub fn resolve(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load(path)?,
            None => Self::load_or_default(Path::new(DESK_DIR))?,
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = var("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT '{}'", port))?;
        }
        if let Some(host) = var("HOST") {
            self.server.host = host;
        }
        match (var("DB_PATH"), var("DB_NAME")) {
            (Some(path), _) => self.server.db_path = PathBuf::from(path),
            (None, Some(name)) => {
                self.server.db_path = Path::new(DESK_DIR).join(format!("{}.db", name))
            }
            (None, None) => {}
        }
        if let Some(url) = var("GITLAB_API_URL") {
            self.tracker.api_url = url;
        }
        if let Some(project) = var("GITLAB_PROJECT_ID") {
            self.tracker.project_id = project;
        }
        if let Some(token) = var("GITLAB_TOKEN") {
            self.tracker.token = Some(token);
        }
        if let Some(flag) = var("GITLAB_MIRROR_UPDATES") {
            self.tracker.mirror_updates = parse_flag(&flag)
                .with_context(|| format!("Invalid GITLAB_MIRROR_UPDATES '{}'", flag))?;
        }
        if let Some(url) = var("DESK_API_URL") {
            self.client.api_url = url;
        }
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0: the OS will pick a random port".to_string());
        }
        if self.tracker.mirror_updates && !self.tracker.is_configured() {
            warnings.push(
                "tracker.mirror_updates is set but no GitLab token is configured".to_string(),
            );
        }
        if self.tracker.is_configured() && self.tracker.project_id.trim().is_empty() {
            warnings.push("GitLab token is set but tracker.project_id is empty".to_string());
        }
        for (key, url) in [
            ("tracker.api_url", &self.tracker.api_url),
            ("client.api_url", &self.client.api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                warnings.push(format!("{} '{}' is not an http(s) URL", key, url));
            }
        }

        warnings
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected true/false, got '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DeskConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.db_path, PathBuf::from(".desk/service_desk.db"));
        assert_eq!(config.tracker.api_url, "https://gitlab.com/api/v4");
        assert_eq!(config.tracker.project_id, "75469260");
        assert!(!config.tracker.is_configured());
        assert!(!config.tracker.mirror_updates);
        assert_eq!(config.client.api_url, "http://localhost:5000/api");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = DeskConfig::parse(
            r#"
            [server]
            port = 8080

            [tracker]
            token = "glpat-abc"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.tracker.is_configured());
        assert_eq!(config.tracker.project_id, "75469260");
    }

    #[test]
    fn test_parse_rejects_bad_types() {
        assert!(DeskConfig::parse("[server]\nport = \"many\"").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = DeskConfig::parse("[server]\nport = 8080").unwrap();
        config
            .apply_env_from(env(&[
                ("PORT", "9090"),
                ("DB_NAME", "service_desk_test"),
                ("GITLAB_TOKEN", "glpat-xyz"),
                ("GITLAB_PROJECT_ID", "acme/desk"),
                ("GITLAB_MIRROR_UPDATES", "true"),
                ("DESK_API_URL", "http://desk.internal/api"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(
            config.server.db_path,
            PathBuf::from(".desk/service_desk_test.db")
        );
        assert_eq!(config.tracker.token.as_deref(), Some("glpat-xyz"));
        assert_eq!(config.tracker.project_id, "acme/desk");
        assert!(config.tracker.mirror_updates);
        assert_eq!(config.client.api_url, "http://desk.internal/api");
    }

    #[test]
    fn test_db_path_wins_over_db_name() {
        let mut config = DeskConfig::default();
        config
            .apply_env_from(env(&[("DB_PATH", "/var/lib/desk.db"), ("DB_NAME", "other")]))
            .unwrap();
        assert_eq!(config.server.db_path, PathBuf::from("/var/lib/desk.db"));
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = DeskConfig::default();
        config
            .apply_env_from(env(&[("GITLAB_TOKEN", ""), ("PORT", " ")]))
            .unwrap();
        assert!(config.tracker.token.is_none());
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_invalid_env_values_error() {
        let mut config = DeskConfig::default();
        assert!(config.apply_env_from(env(&[("PORT", "http")])).is_err());
        assert!(
            config
                .apply_env_from(env(&[("GITLAB_MIRROR_UPDATES", "maybe")]))
                .is_err()
        );
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = DeskConfig::default();
        config.tracker.mirror_updates = true;
        config.client.api_url = "localhost:5000/api".to_string();
        let warnings = config.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("mirror_updates"));
        assert!(warnings[1].contains("client.api_url"));
    }

    #[test]
    fn test_load_or_default_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            DeskConfig::load_or_default(dir.path()).unwrap(),
            DeskConfig::default()
        );
        std::fs::write(dir.path().join(CONFIG_FILE), "[client]\napi_url = \"http://x/api\"")
            .unwrap();
        let config = DeskConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.client.api_url, "http://x/api");
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DeskConfig::resolve(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
