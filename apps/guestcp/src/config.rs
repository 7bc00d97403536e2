//! CLI configuration file.
//!
//! Stored as TOML:
//! - Linux: `~/.config/guestcp/config.toml`
//! - Windows: `%APPDATA%/guestcp/config.toml`
//!
//! Command-line flags and environment variables override file values.

use std::path::{Path, PathBuf};

use anyhow::Context;
use guestcp_client::CpConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    /// API base URL, e.g. `https://api.example.com`.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Default payload frame size in bytes.
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

impl FileConfig {
    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing default file yields an empty config; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_path(), false),
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Resolves the connection settings, preferring the given overrides.
    pub fn resolve(
        &self,
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> anyhow::Result<CpConfig> {
        let base_url = base_url
            .or_else(|| self.base_url.clone())
            .filter(|u| !u.trim().is_empty())
            .context(
                "base URL not configured (use --base-url, GUESTCP_BASE_URL or the config file)",
            )?;
        let api_key = api_key.or_else(|| self.api_key.clone()).unwrap_or_default();
        Ok(CpConfig::new(base_url, api_key))
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("guestcp").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("guestcp")
            .join("config.toml")
    }
}
