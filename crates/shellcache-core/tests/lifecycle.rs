//! End-to-end lifecycle: install, activate over an older generation, then
//! serve cache hits, network misses and offline misses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Url};
use shellcache_core::{
    Agent, AgentError, AgentState, CacheStore, DiskStore, FetchOutcome, Manifest, MemoryStore,
    NetworkClient, NetworkError, Registration, RegistrationData, Request, RequestKey, Response,
};

const SCOPE: &str = "http://localhost:8080/";

fn url(path: &str) -> Url {
    Url::parse(SCOPE).unwrap().join(path).unwrap()
}

#[derive(Default)]
struct CountingNetwork {
    routes: HashMap<String, Response>,
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl CountingNetwork {
    fn app_shell() -> Self {
        let mut routes = HashMap::new();
        routes.insert(url("index.html").to_string(), Response::ok("<html>agenda</html>"));
        routes.insert(url("manifest.json").to_string(), Response::ok(r#"{"name":"agenda"}"#));
        routes.insert(url("api/data").to_string(), Response::ok(r#"{"items":[]}"#));
        Self {
            routes,
            ..Default::default()
        }
    }
}

#[async_trait]
impl NetworkClient for CountingNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Unreachable(request.url.to_string()));
        }
        Ok(self
            .routes
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| Response::new(404, "")))
    }
}

async fn run_scenario<S: CacheStore>(store: Arc<S>) {
    let network = Arc::new(CountingNetwork::app_shell());

    // A previous deployment left its generation behind
    store
        .put("v0", RequestKey::from_url(&url("index.html")), Response::ok("old"))
        .await
        .unwrap();

    let mut agent = Agent::new(
        "v1",
        Manifest::new(["index.html", "manifest.json"]),
        Url::parse(SCOPE).unwrap(),
        Arc::clone(&store),
        Arc::clone(&network),
    );

    let installed = agent.install().await.unwrap();
    assert_eq!(installed.cached, 2);
    assert!(installed.skip_waiting);
    assert_eq!(store.keys("v1").await.unwrap().len(), 2);

    let activated = agent.activate().await.unwrap();
    assert_eq!(activated.deleted, vec!["v0"]);
    assert!(activated.claim_clients);
    assert_eq!(store.list_generations().await.unwrap(), vec!["v1"]);

    // Cache-first: no network access on a hit
    let before = network.calls.load(Ordering::SeqCst);
    let hit = agent.fetch(&Request::get(url("index.html"))).await.unwrap();
    assert_eq!(hit, FetchOutcome::FromCache(Response::ok("<html>agenda</html>")));
    assert_eq!(network.calls.load(Ordering::SeqCst), before);

    // Fallback: a miss returns the live network response
    let miss = agent.fetch(&Request::get(url("api/data"))).await.unwrap();
    assert_eq!(miss, FetchOutcome::FromNetwork(Response::ok(r#"{"items":[]}"#)));

    // Non-GET requests are left alone
    let post = Request::new(Method::POST, url("api/data")).with_body("{}");
    assert_eq!(agent.fetch(&post).await.unwrap(), FetchOutcome::Passthrough);

    // Offline miss fails; offline hit still works
    network.offline.store(true, Ordering::SeqCst);
    let err = agent.fetch(&Request::get(url("api/data"))).await.unwrap_err();
    assert!(matches!(err, AgentError::Network(NetworkError::Unreachable(_))));
    let offline_hit = agent.fetch(&Request::get(url("manifest.json"))).await.unwrap();
    assert!(offline_hit.is_cache_hit());
}

#[tokio::test]
async fn app_shell_scenario_in_memory() {
    run_scenario(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn app_shell_scenario_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    run_scenario(Arc::new(DiskStore::new(dir.path()).unwrap())).await;
}

#[tokio::test]
async fn restarted_process_resumes_from_registration() {
    let dir = tempfile::tempdir().unwrap();
    let network = Arc::new(CountingNetwork::app_shell());
    let manifest = Manifest::new(["index.html", "manifest.json"]);

    {
        let store = Arc::new(DiskStore::new(dir.path()).unwrap());
        let mut agent = Agent::new(
            "v1",
            manifest.clone(),
            Url::parse(SCOPE).unwrap(),
            store,
            Arc::clone(&network),
        );
        agent.install().await.unwrap();
        agent.activate().await.unwrap();

        let mut registration = Registration::new(dir.path().to_path_buf());
        registration.record(RegistrationData::new(
            agent.version(),
            agent.state(),
            agent.clients_claimed(),
        ));
        registration.save().unwrap();
    }

    let mut registration = Registration::new(dir.path().to_path_buf());
    assert!(registration.load().unwrap());
    let (state, claimed) = registration.state_for("v1");
    assert_eq!(state, AgentState::Activated);

    network.offline.store(true, Ordering::SeqCst);
    let store = Arc::new(DiskStore::new(dir.path()).unwrap());
    let agent = Agent::new("v1", manifest, Url::parse(SCOPE).unwrap(), store, network)
        .with_state(state, claimed);

    let outcome = agent.fetch(&Request::get(url("index.html"))).await.unwrap();
    assert_eq!(outcome, FetchOutcome::FromCache(Response::ok("<html>agenda</html>")));
}
