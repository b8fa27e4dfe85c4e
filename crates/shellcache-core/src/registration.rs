//! Persisted agent registration.
//!
//! Each CLI run is a fresh process, so the lifecycle state reached by the
//! last run is kept in `registration.json` next to the cache generations.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentState;

/// Registration file name in cache directory
const REGISTRATION_FILE: &str = "registration.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationData {
    pub version: String,
    pub state: AgentState,
    #[serde(default)]
    pub clients_claimed: bool,
    pub updated_at: DateTime<Utc>,
}

impl RegistrationData {
    pub fn new(version: &str, state: AgentState, clients_claimed: bool) -> Self {
        Self {
            version: version.to_string(),
            state,
            clients_claimed,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistrationFile {
    #[serde(default)]
    active: Option<RegistrationData>,
    #[serde(default)]
    installing: Option<RegistrationData>,
}

/// The active version and, separately, a newer version still on its way in.
///
/// A version only replaces the active one once it reaches `Activated`, so a
/// failed upgrade leaves the previous version serving.
pub struct Registration {
    cache_dir: PathBuf,
    file: RegistrationFile,
}

impl Registration {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            file: RegistrationFile::default(),
        }
    }

    /// Load registration from disk
    pub fn load(&mut self) -> Result<bool> {
        let path = self.registration_path();
        if path.exists() {
            let contents =
                std::fs::read_to_string(&path).context("Failed to read registration file")?;
            self.file =
                serde_json::from_str(&contents).context("Failed to parse registration file")?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Save registration to disk
    pub fn save(&self) -> Result<()> {
        let path = self.registration_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.file)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Record a lifecycle step. Activation promotes the version to active.
    pub fn record(&mut self, data: RegistrationData) {
        if data.state == AgentState::Activated {
            if self
                .file
                .installing
                .as_ref()
                .is_some_and(|pending| pending.version == data.version)
            {
                self.file.installing = None;
            }
            self.file.active = Some(data);
        } else {
            self.file.installing = Some(data);
        }
    }

    pub fn active(&self) -> Option<&RegistrationData> {
        self.file.active.as_ref()
    }

    pub fn installing(&self) -> Option<&RegistrationData> {
        self.file.installing.as_ref()
    }

    /// Recorded state for `version`; an unknown version starts over
    pub fn state_for(&self, version: &str) -> (AgentState, bool) {
        [self.file.active.as_ref(), self.file.installing.as_ref()]
            .into_iter()
            .flatten()
            .find(|data| data.version == version)
            .map(|data| (data.state, data.clients_claimed))
            .unwrap_or((AgentState::Parsed, false))
    }

    fn registration_path(&self) -> PathBuf {
        self.cache_dir.join(REGISTRATION_FILE)
    }
}
