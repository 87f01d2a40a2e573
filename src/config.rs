use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::GroupMergePolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub collect: CollectConfig,

    pub pseudo: PseudoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Root directory localized images are written under.
    pub images_path: String,

    /// Prefix stored in records in place of a localized image's remote url.
    pub image_public_prefix: String,

    /// Event bus buffer size (default: 100)
    pub event_bus_buffer_size: usize,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/catalog.db".to_string(),
            log_level: "info".to_string(),
            images_path: "images".to_string(),
            image_public_prefix: "/upload".to_string(),
            event_bus_buffer_size: 100,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// Timeout for one listing page request.
    pub request_timeout_seconds: u64,

    /// Timeout for one image download.
    pub image_timeout_seconds: u64,

    pub user_agent: String,

    /// Resolve source host names and refuse those pointing at loopback.
    /// Literal loopback addresses are refused regardless.
    pub resolve_target_hosts: bool,

    /// Fixed pause between two pages of the same run.
    pub page_delay_ms: u64,

    /// Group merge policy for sources that do not set their own.
    pub group_merge_policy: GroupMergePolicy,

    /// Largest image accepted, in bytes.
    pub max_image_bytes: u64,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            image_timeout_seconds: 15,
            user_agent: format!("catalog-collect/{}", env!("CARGO_PKG_VERSION")),
            resolve_target_hosts: true,
            page_delay_ms: 0,
            group_merge_policy: GroupMergePolicy::Union,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Text rewriting applied to incoming records before they are stored.
///
/// Every pass is off by default. The synonym table drives all passes except
/// filler injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PseudoConfig {
    pub rewrite_name: bool,
    pub rewrite_play_labels: bool,
    pub rewrite_region: bool,
    pub rewrite_language: bool,
    pub rewrite_content: bool,
    pub inject_filler: bool,

    /// Words inserted into the body at random sentence boundaries.
    pub filler_words: Vec<String>,

    /// How many filler words one record receives.
    pub filler_count: usize,

    pub synonyms: BTreeMap<String, String>,
}

impl Default for PseudoConfig {
    fn default() -> Self {
        Self {
            rewrite_name: false,
            rewrite_play_labels: false,
            rewrite_region: false,
            rewrite_language: false,
            rewrite_content: false,
            inject_filler: false,
            filler_words: Vec::new(),
            filler_count: 2,
            synonyms: BTreeMap::new(),
        }
    }
}

impl PseudoConfig {
    #[must_use]
    pub const fn any_enabled(&self) -> bool {
        self.rewrite_name
            || self.rewrite_play_labels
            || self.rewrite_region
            || self.rewrite_language
            || self.rewrite_content
            || self.inject_filler
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("catalog-collect").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".catalog-collect").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.collect.request_timeout_seconds == 0 {
            anyhow::bail!("collect.request_timeout_seconds must be > 0");
        }

        if self.collect.image_timeout_seconds == 0 {
            anyhow::bail!("collect.image_timeout_seconds must be > 0");
        }

        if self.pseudo.inject_filler && self.pseudo.filler_words.is_empty() {
            anyhow::bail!("pseudo.inject_filler requires at least one filler word");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("general.min_db_connections cannot exceed max_db_connections");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.collect.request_timeout_seconds, 30);
        assert_eq!(config.collect.group_merge_policy, GroupMergePolicy::Union);
        assert!(config.collect.resolve_target_hosts);
        assert!(!config.pseudo.any_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[collect]"));
        assert!(toml_str.contains("[pseudo]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [collect]
            group_merge_policy = "replace"
            page_delay_ms = 250

            [pseudo]
            rewrite_name = true

            [pseudo.synonyms]
            "高清" = "超清"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.collect.group_merge_policy, GroupMergePolicy::Replace);
        assert_eq!(config.collect.page_delay_ms, 250);
        assert_eq!(config.collect.request_timeout_seconds, 30);
        assert!(config.pseudo.rewrite_name);
        assert_eq!(config.pseudo.synonyms.get("高清").map(String::as_str), Some("超清"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.collect.image_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }
}
