// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration for reelctl.
//!
//! The service address is resolved in priority order: `--url` flag,
//! `REELD_URL` environment variable, `~/.reelctl/config.json`, then the
//! built-in default. A missing or unreadable config file is not an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where the download service listens when nothing else is configured.
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000";

/// Environment variable overriding the configured service URL.
pub const SERVICE_URL_ENV: &str = "REELD_URL";

/// On-disk configuration, `~/.reelctl/config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the download service.
    pub service_url: Option<String>,
}

impl Config {
    /// Path of the config file.
    pub fn path() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".reelctl").join("config.json"))
            .unwrap_or_else(|| PathBuf::from(".reelctl/config.json"))
    }

    /// Load the config file, falling back to defaults when it is missing
    /// or unparseable.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };

        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring malformed config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve the service URL from CLI flag, environment, file, default.
    pub fn resolve_service_url(&self, cli_override: Option<String>) -> String {
        resolve(cli_override, std::env::var(SERVICE_URL_ENV).ok(), self)
    }
}

fn resolve(cli: Option<String>, env: Option<String>, config: &Config) -> String {
    cli.or(env)
        .or_else(|| config.service_url.clone())
        .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = Config::load_from(Path::new("/nonexistent/reelctl/config.json"));
        assert!(config.service_url.is_none());
    }

    #[test]
    fn test_resolution_priority() {
        let config = Config {
            service_url: Some("http://from-file:5000".to_string()),
        };

        assert_eq!(
            resolve(
                Some("http://from-flag:5000".to_string()),
                Some("http://from-env:5000".to_string()),
                &config
            ),
            "http://from-flag:5000"
        );
        assert_eq!(
            resolve(None, Some("http://from-env:5000".to_string()), &config),
            "http://from-env:5000"
        );
        assert_eq!(resolve(None, None, &config), "http://from-file:5000");
        assert_eq!(resolve(None, None, &Config::default()), DEFAULT_SERVICE_URL);
    }
}
