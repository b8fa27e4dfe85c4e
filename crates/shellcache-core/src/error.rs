use thiserror::Error;

use crate::agent::AgentState;

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to fetch manifest resource {path}: {source}")]
    InstallFetch {
        path: String,
        #[source]
        source: NetworkError,
    },

    #[error("Manifest resource {path} returned status {status}: {body}")]
    InstallStatus {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Failed to delete stale cache generations: {}", .failed.join(", "))]
    Cleanup {
        deleted: Vec<String>,
        failed: Vec<String>,
    },

    #[error("Invalid manifest entry: {0:?}")]
    InvalidManifestEntry(String),

    #[error("Invalid scope URL {url}: {reason}")]
    InvalidScope { url: String, reason: String },

    #[error("Agent is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: AgentState,
    },

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl AgentError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &[u8]) -> String {
        let text = String::from_utf8_lossy(body);
        if text.len() <= MAX_ERROR_BODY_LENGTH {
            text.into_owned()
        } else {
            let cut: String = text.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", cut, body.len())
        }
    }

    pub fn from_status(path: &str, status: u16, body: &[u8]) -> Self {
        AgentError::InstallStatus {
            path: path.to_string(),
            status,
            body: Self::truncate_body(body),
        }
    }
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid request header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid cache generation name: {0:?}")]
    InvalidGeneration(String),

    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache generation {generation}: {source}")]
    Corrupt {
        generation: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cache backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_keeps_short_body() {
        let err = AgentError::from_status("index.html", 404, b"not here");
        assert_eq!(
            err.to_string(),
            "Manifest resource index.html returned status 404: not here"
        );
    }

    #[test]
    fn test_from_status_truncates_long_body() {
        let body = vec![b'x'; 2000];
        match AgentError::from_status("index.html", 500, &body) {
            AgentError::InstallStatus { body, .. } => {
                assert!(body.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
                assert!(body.ends_with("(truncated, 2000 total bytes)"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cleanup_lists_failed_generations() {
        let err = AgentError::Cleanup {
            deleted: vec!["v0".to_string()],
            failed: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Failed to delete stale cache generations: a, b"
        );
    }
}
