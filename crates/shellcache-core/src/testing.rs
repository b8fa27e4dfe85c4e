//! Fakes shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Url;

use crate::cache::{CacheStore, MemoryStore};
use crate::error::{NetworkError, StoreError};
use crate::models::{Request, RequestKey, Response};
use crate::network::NetworkClient;

pub const SCOPE: &str = "http://localhost:8080/";

pub fn scope() -> Url {
    Url::parse(SCOPE).expect("test scope should parse")
}

pub fn url(path: &str) -> Url {
    scope().join(path).expect("test URL should resolve")
}

/// Network with fixed routes and a call counter. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeNetwork {
    routes: HashMap<String, Response>,
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, path: &str, response: Response) -> Self {
        self.routes.insert(url(path).to_string(), response);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkClient for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Unreachable(request.url.to_string()));
        }
        Ok(self
            .routes
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| Response::new(404, "not found")))
    }
}

/// Memory store whose deletes fail for selected generations.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_deletes: HashSet<String>,
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn open(&self, generation: &str) -> Result<(), StoreError> {
        self.inner.open(generation).await
    }

    async fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<Response>, StoreError> {
        self.inner.get(generation, key).await
    }

    async fn put(
        &self,
        generation: &str,
        key: RequestKey,
        response: Response,
    ) -> Result<(), StoreError> {
        self.inner.put(generation, key, response).await
    }

    async fn delete(&self, generation: &str) -> Result<bool, StoreError> {
        if self.fail_deletes.contains(generation) {
            return Err(StoreError::Backend(format!("delete of {} refused", generation)));
        }
        self.inner.delete(generation).await
    }

    async fn list_generations(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_generations().await
    }

    async fn keys(&self, generation: &str) -> Result<Vec<RequestKey>, StoreError> {
        self.inner.keys(generation).await
    }
}
