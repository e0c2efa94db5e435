//! Shared runtime configuration for the eduadmin client and CLI.
//!
//! The configuration is persisted as `eduadmin.toml`. Every section and field
//! carries a serde default, so partial files (or no file at all) load into a
//! usable config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "eduadmin.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    HomeUnavailable,
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Top-level configuration (persisted as `eduadmin.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AdminConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub selector: SelectorSettings,
    #[serde(default)]
    pub toolbar: ToolbarSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    /// Origin the console is served from, e.g. `http://localhost:5173`.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Path prefix of the API, appended to `origin`.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Same-origin path that proxies object-storage uploads.
    #[serde(default = "default_oss_proxy_prefix")]
    pub oss_proxy_prefix: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            api_prefix: default_api_prefix(),
            oss_proxy_prefix: default_oss_proxy_prefix(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerSettings {
    /// `origin` + `api_prefix`, without a trailing slash.
    pub fn api_base_url(&self) -> String {
        format!(
            "{}{}",
            self.origin.trim_end_matches('/'),
            normalize_prefix(&self.api_prefix)
        )
    }

    /// Request timeout. A zero in the file means the default.
    pub fn timeout(&self) -> Duration {
        match self.timeout_secs {
            0 => Duration::from_secs(default_timeout_secs()),
            secs => Duration::from_secs(secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    /// Where the user is sent after the session expires.
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,
    #[serde(default = "default_redirect_delay_ms")]
    pub redirect_delay_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sign_in_path: default_sign_in_path(),
            redirect_delay_ms: default_redirect_delay_ms(),
        }
    }
}

impl SessionSettings {
    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageSettings {
    /// Directory holding persisted stores. Empty means the platform default.
    #[serde(default)]
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectorSettings {
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
    #[serde(default = "default_fallback_limit")]
    pub fallback_limit: u32,
    #[serde(default = "default_question_bank_limit")]
    pub question_bank_limit: u32,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            fallback_limit: default_fallback_limit(),
            question_bank_limit: default_question_bank_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolbarSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for ToolbarSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl ToolbarSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_origin() -> String {
    "http://localhost:5173".to_string()
}
fn default_api_prefix() -> String {
    "/api".to_string()
}
fn default_oss_proxy_prefix() -> String {
    "/proxyOss".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_sign_in_path() -> String {
    "/sign-in".to_string()
}
fn default_redirect_delay_ms() -> u64 {
    100
}
fn default_search_limit() -> u32 {
    20
}
fn default_fallback_limit() -> u32 {
    100
}
fn default_question_bank_limit() -> u32 {
    50
}
fn default_debounce_ms() -> u64 {
    300
}

/// Ensure a path prefix starts with `/` and has no trailing slash.
/// An empty prefix stays empty.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn home_dir() -> Result<PathBuf, ConfigError> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .map_err(|_| ConfigError::HomeUnavailable)
}

/// Config directory (`~/.config/eduadmin/`).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(".config").join("eduadmin"))
}

/// Canonical config file path.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Default directory for persisted stores (`~/.local/share/eduadmin/`).
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(".local").join("share").join("eduadmin"))
}

impl AdminConfig {
    /// Directory holding persisted stores, honoring `storage.data_dir`.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if self.storage.data_dir.trim().is_empty() {
            default_data_dir()
        } else {
            Ok(PathBuf::from(&self.storage.data_dir))
        }
    }
}

/// Load a config file. A missing file yields the defaults.
pub fn load_from(path: &Path) -> Result<AdminConfig, ConfigError> {
    if !path.exists() {
        return Ok(AdminConfig::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a config file, creating parent directories as needed.
pub fn save_to(path: &Path, config: &AdminConfig) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: AdminConfig = toml::from_str(
            r#"
[server]
origin = "https://admin.example.com/"

[toolbar]
debounce_ms = 150
"#,
        )
        .expect("parse toml");

        assert_eq!(cfg.server.api_base_url(), "https://admin.example.com/api");
        assert_eq!(cfg.server.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.session.sign_in_path, "/sign-in");
        assert_eq!(cfg.selector.fallback_limit, 100);
        assert_eq!(cfg.toolbar.debounce(), Duration::from_millis(150));
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let server = ServerSettings {
            timeout_secs: 0,
            ..ServerSettings::default()
        };
        assert_eq!(server.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn prefixes_are_normalized() {
        assert_eq!(normalize_prefix("api/"), "/api");
        assert_eq!(normalize_prefix("/proxyOss"), "/proxyOss");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn missing_file_loads_defaults_and_save_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let cfg = load_from(&path).expect("load missing");
        assert_eq!(cfg, AdminConfig::default());

        let mut cfg = cfg;
        cfg.server.origin = "https://console.school.edu".to_string();
        cfg.storage.data_dir = dir.path().display().to_string();
        save_to(&path, &cfg).expect("save");

        let reloaded = load_from(&path).expect("reload");
        assert_eq!(reloaded, cfg);
        assert_eq!(reloaded.data_dir().expect("data dir"), dir.path());
    }

    #[test]
    fn broken_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[server\norigin = ").expect("write");

        let err = load_from(&path).expect_err("parse should fail");
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }
}
