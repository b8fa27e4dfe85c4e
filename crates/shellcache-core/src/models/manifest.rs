use std::collections::HashSet;

use reqwest::Url;

use super::RequestKey;
use crate::error::AgentError;

/// Fixed, ordered list of app shell resources cached at install time.
///
/// Entries are paths relative to the agent scope. Duplicates are dropped on
/// construction, keeping the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    entries: Vec<String>,
}

impl Manifest {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.into();
            if !unique.contains(&entry) {
                unique.push(entry);
            }
        }
        Self { entries: unique }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every entry against the scope, in manifest order.
    ///
    /// Entries that resolve to the same cache key (`index.html` and
    /// `./index.html`) are kept once, at their first position.
    pub fn resolve(&self, scope: &Url) -> Result<Vec<(String, Url)>, AgentError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if entry.trim().is_empty() {
                return Err(AgentError::InvalidManifestEntry(entry.clone()));
            }
            let url = scope
                .join(entry)
                .map_err(|_| AgentError::InvalidManifestEntry(entry.clone()))?;
            if seen.insert(RequestKey::from_url(&url)) {
                resolved.push((entry.clone(), url));
            }
        }
        Ok(resolved)
    }
}
