//! Install, activate and fetch handlers.
//!
//! Each handler receives everything it touches as arguments; none of them
//! keeps state between calls.

use futures::future::{join_all, try_join_all};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::{AgentError, AgentResult};
use crate::models::{Manifest, Request, RequestKey, Response};
use crate::network::NetworkClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub generation: String,
    /// Number of manifest resources stored
    pub cached: usize,
    /// Ask the runtime to activate without waiting for old clients to close
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateOutcome {
    /// Stale generations removed during cleanup
    pub deleted: Vec<String>,
    /// Ask the runtime to take control of already-open clients
    pub claim_clients: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not intercepted; the runtime sends the request unmodified
    Passthrough,
    FromCache(Response),
    FromNetwork(Response),
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Passthrough => None,
            FetchOutcome::FromCache(r) | FetchOutcome::FromNetwork(r) => Some(r),
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, FetchOutcome::FromCache(_))
    }
}

/// Populate the `version` generation with every manifest resource.
///
/// All resources are fetched before anything is written, so a failed
/// install never adds entries to the generation.
pub async fn on_install<S, N>(
    version: &str,
    manifest: &Manifest,
    scope: &Url,
    store: &S,
    network: &N,
) -> AgentResult<InstallOutcome>
where
    S: CacheStore + ?Sized,
    N: NetworkClient + ?Sized,
{
    info!(generation = version, "Installing");
    let resources = manifest.resolve(scope)?;
    store.open(version).await?;

    info!(generation = version, count = resources.len(), "Caching app shell files");
    let fetches = resources.iter().map(|(path, url)| async move {
        let response = network
            .fetch(&Request::get(url.clone()))
            .await
            .map_err(|source| AgentError::InstallFetch {
                path: path.clone(),
                source,
            })?;
        if !response.is_success() {
            return Err(AgentError::from_status(path, response.status, &response.body));
        }
        Ok::<_, AgentError>((RequestKey::from_url(url), response))
    });
    let fetched = try_join_all(fetches).await?;

    let cached = fetched.len();
    for (key, response) in fetched {
        store.put(version, key, response).await?;
    }

    Ok(InstallOutcome {
        generation: version.to_string(),
        cached,
        skip_waiting: true,
    })
}

/// Delete every generation other than `version`.
///
/// Deletions run concurrently and are all awaited; failures are collected
/// into a single `Cleanup` error naming each generation left behind.
pub async fn on_activate<S>(version: &str, store: &S) -> AgentResult<ActivateOutcome>
where
    S: CacheStore + ?Sized,
{
    info!(generation = version, "Activating");
    let stale: Vec<String> = store
        .list_generations()
        .await?
        .into_iter()
        .filter(|name| name != version)
        .collect();

    let deletions = stale.iter().map(|name| async move {
        info!(generation = %name, "Deleting stale cache generation");
        (name.clone(), store.delete(name).await)
    });

    let mut deleted = Vec::new();
    let mut failed = Vec::new();
    for (name, result) in join_all(deletions).await {
        match result {
            Ok(true) => deleted.push(name),
            Ok(false) => debug!(generation = %name, "Stale generation already gone"),
            Err(e) => {
                warn!(generation = %name, error = %e, "Failed to delete stale cache generation");
                failed.push(name);
            }
        }
    }

    if !failed.is_empty() {
        return Err(AgentError::Cleanup { deleted, failed });
    }

    Ok(ActivateOutcome {
        deleted,
        claim_clients: true,
    })
}

/// Cache-first handling of one intercepted request.
///
/// Non-GET requests are passed through without a cache lookup. Network
/// responses are returned as-is and never written back to the cache.
pub async fn on_fetch<S, N>(
    request: &Request,
    version: &str,
    store: &S,
    network: &N,
) -> AgentResult<FetchOutcome>
where
    S: CacheStore + ?Sized,
    N: NetworkClient + ?Sized,
{
    if !request.is_get() {
        return Ok(FetchOutcome::Passthrough);
    }

    let key = request.key();
    if let Some(cached) = store.get(version, &key).await? {
        debug!(url = %key, "Serving from cache");
        return Ok(FetchOutcome::FromCache(cached));
    }

    debug!(url = %key, "Serving from network");
    match network.fetch(request).await {
        Ok(response) => Ok(FetchOutcome::FromNetwork(response)),
        Err(e) => {
            warn!(url = %request.url, error = %e, "Failed to load");
            Err(e.into())
        }
    }
}
