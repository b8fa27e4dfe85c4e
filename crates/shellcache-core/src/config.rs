//! Agent configuration management.
//!
//! Configuration covers the cache generation name, the app shell manifest
//! and the scope the manifest resolves against. It is stored at
//! `~/.config/shellcache/config.json`; every field has a default, so a
//! missing file or a partial file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, AgentResult};
use crate::models::Manifest;
use crate::network::client::DEFAULT_REQUEST_TIMEOUT_SECS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "shellcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Cache generation name. Bump it whenever a cached resource changes.
pub const DEFAULT_CACHE_NAME: &str = "psicoagenda-v1";

/// App shell resources cached at install time
pub const DEFAULT_MANIFEST: &[&str] = &["index.html", "manifest.json"];

const DEFAULT_SCOPE: &str = "http://localhost:8080/";

const ENV_SCOPE: &str = "SHELLCACHE_SCOPE";
const ENV_CACHE_NAME: &str = "SHELLCACHE_CACHE_NAME";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub scope: String,
    pub cache_name: String,
    pub manifest: Vec<String>,
    pub request_timeout_secs: u64,
    pub cache_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            scope: DEFAULT_SCOPE.to_string(),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cache_dir: None,
        }
    }
}

impl AgentConfig {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Ok(Self::load_from(&path)?.with_env_overrides())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(scope) = std::env::var(ENV_SCOPE) {
            self.scope = scope;
        }
        if let Ok(name) = std::env::var(ENV_CACHE_NAME) {
            self.cache_name = name;
        }
        self
    }

    /// Scope URL, normalized to end in a slash so relative paths join under it
    pub fn scope_url(&self) -> AgentResult<Url> {
        let mut url = Url::parse(&self.scope).map_err(|e| AgentError::InvalidScope {
            url: self.scope.clone(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(AgentError::InvalidScope {
                url: self.scope.clone(),
                reason: "not a base URL".to_string(),
            });
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn manifest(&self) -> Manifest {
        Manifest::new(self.manifest.iter().cloned())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Explicit cache directory, or one per scope host under the user cache dir
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }

        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;

        let mut path = cache_dir.join(APP_NAME);
        if let Ok(scope) = self.scope_url() {
            if let Some(host) = scope.host_str() {
                let host = match scope.port() {
                    Some(port) => format!("{}_{}", host, port),
                    None => host.to_string(),
                };
                path = path.join(host);
            }
        }
        Ok(path)
    }
}
