use std::fmt;

use serde::{Deserialize, Serialize};

/// Agent lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Loaded, no lifecycle signal handled yet
    Parsed,
    /// Install signal is being handled
    Installing,
    /// Manifest cached, waiting for activation
    Installed,
    /// Activate signal is being handled
    Activating,
    /// Controlling clients and intercepting fetches
    Activated,
    /// Install failed; a later install may retry
    Redundant,
}

impl AgentState {
    /// Only an active agent intercepts fetches
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, AgentState::Activated)
    }

    pub fn can_install(&self) -> bool {
        matches!(self, AgentState::Parsed | AgentState::Redundant)
    }

    pub fn can_activate(&self) -> bool {
        matches!(self, AgentState::Installed)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Parsed => write!(f, "parsed"),
            AgentState::Installing => write!(f, "installing"),
            AgentState::Installed => write!(f, "installed"),
            AgentState::Activating => write!(f, "activating"),
            AgentState::Activated => write!(f, "activated"),
            AgentState::Redundant => write!(f, "redundant"),
        }
    }
}
