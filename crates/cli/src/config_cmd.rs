use anyhow::{Context, Result, bail};
use eduadmin_runtime_config::{AdminConfig, config_path, load_from, normalize_prefix, save_to};
use std::path::{Path, PathBuf};

pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => config_path().context("Could not determine config location"),
    }
}

pub fn load_config(path: &Path) -> Result<AdminConfig> {
    load_from(path).with_context(|| format!("Failed to load config at {}", path.display()))
}

#[derive(Debug, Default)]
pub struct ConfigUpdate {
    pub origin: Option<String>,
    pub api_prefix: Option<String>,
    pub timeout_secs: Option<u64>,
    pub data_dir: Option<String>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.origin.is_none()
            && self.api_prefix.is_none()
            && self.timeout_secs.is_none()
            && self.data_dir.is_none()
    }

    fn apply(self, config: &mut AdminConfig) -> Result<()> {
        if self.timeout_secs == Some(0) {
            bail!("Timeout must be at least one second");
        }
        if let Some(origin) = self.origin {
            config.server.origin = origin.trim().trim_end_matches('/').to_string();
        }
        if let Some(prefix) = self.api_prefix {
            config.server.api_prefix = normalize_prefix(&prefix);
        }
        if let Some(secs) = self.timeout_secs {
            config.server.timeout_secs = secs;
        }
        if let Some(dir) = self.data_dir {
            config.storage.data_dir = dir;
        }
        Ok(())
    }
}

pub fn show_config(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
    println!("# {}", path.display());
    print!("{rendered}");
    Ok(())
}

pub fn set_config(path: &Path, update: ConfigUpdate) -> Result<()> {
    let mut config = load_config(path)?;
    update.apply(&mut config)?;
    save_to(path, &config).with_context(|| format!("Failed to save config at {}", path.display()))?;
    println!("Config saved to {}", path.display());
    println!("  API base: {}", config.server.api_base_url());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_normalizes_origin_and_prefix() {
        let mut config = AdminConfig::default();
        ConfigUpdate {
            origin: Some(" https://admin.example.edu/ ".to_string()),
            api_prefix: Some("v2/".to_string()),
            ..ConfigUpdate::default()
        }
        .apply(&mut config)
        .expect("valid update");
        assert_eq!(config.server.origin, "https://admin.example.edu");
        assert_eq!(config.server.api_prefix, "/v2");
        assert_eq!(config.server.timeout_secs, 30);
    }

    #[test]
    fn zero_timeout_is_rejected_and_nothing_is_saved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("eduadmin.toml");
        let err = set_config(
            &path,
            ConfigUpdate {
                timeout_secs: Some(0),
                ..ConfigUpdate::default()
            },
        )
        .expect_err("zero timeout");
        assert!(err.to_string().contains("at least one second"));
        assert!(!path.exists());
    }

    #[test]
    fn set_then_load_round_trips_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("eduadmin.toml");
        set_config(
            &path,
            ConfigUpdate {
                timeout_secs: Some(5),
                ..ConfigUpdate::default()
            },
        )
        .expect("save");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded.server.timeout_secs, 5);
        assert_eq!(loaded.server.origin, AdminConfig::default().server.origin);
    }
}
