use std::sync::Arc;

use reqwest::Url;
use tracing::{info, warn};

use super::handlers::{on_activate, on_fetch, on_install, ActivateOutcome, FetchOutcome, InstallOutcome};
use super::state::AgentState;
use crate::cache::CacheStore;
use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::models::{Manifest, Request};
use crate::network::NetworkClient;

/// The cache agent for one app version.
///
/// Install and activate move the agent through its lifecycle; fetches are
/// only intercepted once it is activated.
pub struct Agent<S: ?Sized, N: ?Sized> {
    version: Arc<str>,
    manifest: Manifest,
    scope: Url,
    store: Arc<S>,
    network: Arc<N>,
    state: AgentState,
    clients_claimed: bool,
}

impl<S, N> Agent<S, N>
where
    S: CacheStore + ?Sized,
    N: NetworkClient + ?Sized,
{
    pub fn new(
        version: &str,
        manifest: Manifest,
        scope: Url,
        store: Arc<S>,
        network: Arc<N>,
    ) -> Self {
        Self {
            version: Arc::from(version),
            manifest,
            scope,
            store,
            network,
            state: AgentState::Parsed,
            clients_claimed: false,
        }
    }

    pub fn from_config(config: &AgentConfig, store: Arc<S>, network: Arc<N>) -> AgentResult<Self> {
        Ok(Self::new(
            &config.cache_name,
            config.manifest(),
            config.scope_url()?,
            store,
            network,
        ))
    }

    /// Resume a lifecycle recorded by an earlier run
    pub fn with_state(mut self, state: AgentState, clients_claimed: bool) -> Self {
        self.state = state;
        self.clients_claimed = clients_claimed;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed
    }

    pub async fn install(&mut self) -> AgentResult<InstallOutcome> {
        if !self.state.can_install() {
            return Err(AgentError::InvalidState {
                expected: "parsed or redundant",
                actual: self.state,
            });
        }

        self.state = AgentState::Installing;
        let result = on_install(
            &self.version,
            &self.manifest,
            &self.scope,
            self.store.as_ref(),
            self.network.as_ref(),
        )
        .await;

        match result {
            Ok(outcome) => {
                self.state = AgentState::Installed;
                info!(generation = %self.version, cached = outcome.cached, "Installed");
                Ok(outcome)
            }
            Err(e) => {
                self.state = AgentState::Redundant;
                warn!(generation = %self.version, error = %e, "Install failed");
                Err(e)
            }
        }
    }

    /// Clean up stale generations and take control of clients.
    ///
    /// A cleanup failure is returned to the caller, but the agent still ends
    /// up activated with its clients claimed.
    pub async fn activate(&mut self) -> AgentResult<ActivateOutcome> {
        if !self.state.can_activate() {
            return Err(AgentError::InvalidState {
                expected: "installed",
                actual: self.state,
            });
        }

        self.state = AgentState::Activating;
        let result = on_activate(&self.version, self.store.as_ref()).await;

        self.state = AgentState::Activated;
        self.clients_claimed = true;
        info!(generation = %self.version, "Activated, claiming clients");
        result
    }

    pub async fn fetch(&self, request: &Request) -> AgentResult<FetchOutcome> {
        self.fetch_handle().handle(request).await
    }

    /// Handle for serving fetches from concurrently running tasks
    pub fn fetch_handle(&self) -> FetchHandle<S, N> {
        FetchHandle {
            version: Arc::clone(&self.version),
            store: Arc::clone(&self.store),
            network: Arc::clone(&self.network),
            intercepting: self.state.can_intercept_fetch(),
        }
    }
}

/// Shares the agent's store and network. Clone is cheap.
pub struct FetchHandle<S: ?Sized, N: ?Sized> {
    version: Arc<str>,
    store: Arc<S>,
    network: Arc<N>,
    intercepting: bool,
}

impl<S: ?Sized, N: ?Sized> Clone for FetchHandle<S, N> {
    fn clone(&self) -> Self {
        Self {
            version: Arc::clone(&self.version),
            store: Arc::clone(&self.store),
            network: Arc::clone(&self.network),
            intercepting: self.intercepting,
        }
    }
}

impl<S, N> FetchHandle<S, N>
where
    S: CacheStore + ?Sized,
    N: NetworkClient + ?Sized,
{
    pub async fn handle(&self, request: &Request) -> AgentResult<FetchOutcome> {
        if !self.intercepting {
            return Ok(FetchOutcome::Passthrough);
        }
        on_fetch(request, &self.version, self.store.as_ref(), self.network.as_ref()).await
    }
}
