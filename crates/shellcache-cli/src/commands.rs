//! Command parsing and the runtime that drives the agent.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use shellcache_core::utils::format_size;
use shellcache_core::{
    Agent, AgentConfig, AgentError, AgentState, CacheStore, DiskStore, FetchOutcome, HttpClient,
    Manifest, Method, NetworkClient, Registration, RegistrationData, Request, Response, Url,
};
use tracing::warn;

pub const USAGE: &str = "\
Usage: shellcache <command>

Commands:
  register                 Install the app shell, then activate
  install                  Cache the manifest into the current generation
  activate                 Delete stale generations and claim clients
  fetch <path|url> [opts]  Send one request through the agent
      --method <METHOD>    Request method (default GET)
      --body               Print the response body
  status                   Show registration and cached generations
  help                     Show this message

Configuration: ~/.config/shellcache/config.json
Environment:   SHELLCACHE_SCOPE, SHELLCACHE_CACHE_NAME, RUST_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register,
    Install,
    Activate,
    Fetch {
        target: String,
        method: Method,
        show_body: bool,
    },
    Status,
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some(name) = args.first() else {
            return Ok(Command::Help);
        };
        let rest = &args[1..];

        let command = match name.as_str() {
            "register" => Command::Register,
            "install" => Command::Install,
            "activate" => Command::Activate,
            "status" => Command::Status,
            "help" | "--help" | "-h" => Command::Help,
            "fetch" => return Self::parse_fetch(rest),
            other => bail!("Unknown command: {}", other),
        };
        if let Some(extra) = rest.first() {
            bail!("Unexpected argument for {}: {}", name, extra);
        }
        Ok(command)
    }

    fn parse_fetch(args: &[String]) -> Result<Self> {
        let mut target = None;
        let mut method = Method::GET;
        let mut show_body = false;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--body" => show_body = true,
                "--method" => {
                    let value = iter.next().context("--method needs a value")?;
                    method = Method::from_bytes(value.to_ascii_uppercase().as_bytes())
                        .with_context(|| format!("Invalid method: {}", value))?;
                }
                flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
                value if target.is_none() => target = Some(value.to_string()),
                value => bail!("Unexpected argument for fetch: {}", value),
            }
        }

        Ok(Command::Fetch {
            target: target.context("fetch needs a path or URL")?,
            method,
            show_body,
        })
    }
}

pub async fn run(command: Command, config: &AgentConfig, cache_dir: &Path) -> Result<()> {
    let mut runtime = Runtime::open(config, cache_dir)?;
    match command {
        Command::Register => runtime.register().await,
        Command::Install => runtime.install().await.map(|_| ()),
        Command::Activate => runtime.activate().await,
        Command::Fetch {
            target,
            method,
            show_body,
        } => runtime.fetch(&target, method, show_body).await,
        Command::Status => runtime.status().await,
        Command::Help => Ok(()),
    }
}

/// Hosting runtime for a single agent, persisting its lifecycle between runs.
///
/// Until the configured version is activated, fetches keep going through the
/// previously active version, if there is one.
struct Runtime {
    agent: Agent<DiskStore, HttpClient>,
    previous: Option<Agent<DiskStore, HttpClient>>,
    store: Arc<DiskStore>,
    network: Arc<HttpClient>,
    registration: Registration,
}

impl Runtime {
    fn open(config: &AgentConfig, cache_dir: &Path) -> Result<Self> {
        let store = Arc::new(DiskStore::new(cache_dir)?);
        let network = Arc::new(HttpClient::new(config.request_timeout())?);

        let mut registration = Registration::new(cache_dir.to_path_buf());
        if let Err(e) = registration.load() {
            warn!(error = %e, "Ignoring unreadable registration");
        }
        let (state, claimed) = registration.state_for(&config.cache_name);

        let agent = Agent::from_config(config, Arc::clone(&store), Arc::clone(&network))?
            .with_state(state, claimed);

        // Serving a fetch needs only the version; the old manifest is not kept
        let previous = registration
            .active()
            .filter(|active| active.version != config.cache_name)
            .map(|active| {
                Agent::new(
                    &active.version,
                    Manifest::default(),
                    agent.scope().clone(),
                    Arc::clone(&store),
                    Arc::clone(&network),
                )
                .with_state(active.state, active.clients_claimed)
            });

        Ok(Self {
            agent,
            previous,
            store,
            network,
            registration,
        })
    }

    fn record(&mut self) -> Result<()> {
        self.registration.record(RegistrationData::new(
            self.agent.version(),
            self.agent.state(),
            self.agent.clients_claimed(),
        ));
        self.registration.save()
    }

    async fn register(&mut self) -> Result<()> {
        if self.agent.state() == AgentState::Activated {
            println!("{} is already active", self.agent.version());
            return Ok(());
        }
        if self.agent.state().can_install() && !self.install().await? {
            return Ok(());
        }
        self.activate().await
    }

    /// Returns whether the agent asked to skip waiting
    async fn install(&mut self) -> Result<bool> {
        let result = self.agent.install().await;
        if !matches!(result, Err(AgentError::InvalidState { .. })) {
            self.record()?;
        }
        let outcome = result.context("Install failed")?;
        println!(
            "Installed {} ({} resources cached)",
            outcome.generation, outcome.cached
        );
        Ok(outcome.skip_waiting)
    }

    async fn activate(&mut self) -> Result<()> {
        let result = self.agent.activate().await;
        if !matches!(result, Err(AgentError::InvalidState { .. })) {
            self.record()?;
            self.previous = None;
        }
        let outcome = result.context("Activation failed")?;
        for name in &outcome.deleted {
            println!("Deleted stale generation {}", name);
        }
        println!("Activated {}", self.agent.version());
        Ok(())
    }

    /// The agent that controls clients right now
    fn controller(&self) -> &Agent<DiskStore, HttpClient> {
        match self.previous {
            Some(ref previous) if !self.agent.state().can_intercept_fetch() => previous,
            _ => &self.agent,
        }
    }

    fn resolve(&self, target: &str) -> Result<Url> {
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(_) => self
                .agent
                .scope()
                .join(target)
                .with_context(|| format!("Invalid path: {}", target)),
        }
    }

    /// Run one request through the controlling agent, falling back to the
    /// plain network path when it is not intercepted
    async fn serve(&self, request: &Request) -> Result<(&'static str, Response)> {
        let outcome = self
            .controller()
            .fetch(request)
            .await
            .with_context(|| format!("Failed to load {}", request.url))?;
        Ok(match outcome {
            FetchOutcome::FromCache(response) => ("cache", response),
            FetchOutcome::FromNetwork(response) => ("network", response),
            FetchOutcome::Passthrough => {
                let response = self
                    .network
                    .fetch(request)
                    .await
                    .with_context(|| format!("Failed to load {}", request.url))?;
                ("network, not intercepted", response)
            }
        })
    }

    async fn fetch(&self, target: &str, method: Method, show_body: bool) -> Result<()> {
        let url = self.resolve(target)?;
        let request = Request::new(method, url.clone());
        let (source, response) = self.serve(&request).await?;

        println!(
            "{} {} {} ({}, {}, {})",
            response.status,
            request.method,
            url,
            source,
            self.controller().version(),
            format_size(response.body.len())
        );
        if show_body {
            println!("{}", response.body_text());
        }
        Ok(())
    }

    async fn status(&self) -> Result<()> {
        let version = self.agent.version();
        println!("Version:   {}", version);
        println!("Scope:     {}", self.agent.scope());
        println!("Manifest:  {}", self.agent.manifest().entries().join(", "));
        println!("State:     {}", self.agent.state());
        println!("Claimed:   {}", if self.agent.clients_claimed() { "yes" } else { "no" });
        for (label, data) in [
            ("Active:", self.registration.active()),
            ("Pending:", self.registration.installing()),
        ] {
            if let Some(data) = data {
                println!(
                    "{:<10} {} {} at {}",
                    label,
                    data.version,
                    data.state,
                    data.updated_at.format("%Y-%m-%d %H:%M UTC")
                );
            }
        }

        let generations = self.store.list_generations().await?;
        if generations.is_empty() {
            println!("Generations: none");
            return Ok(());
        }
        println!("Generations:");
        for name in generations {
            let entries = self.store.keys(&name).await?;
            let age = self
                .store
                .generation_age(&name)
                .await?
                .unwrap_or_else(|| "never".to_string());
            let marker = if name == version {
                "current"
            } else if self.registration.active().is_some_and(|a| a.version == name) {
                "active"
            } else {
                "stale"
            };
            println!("  {} [{}] {} entries, written {}", name, marker, entries.len(), age);
            for key in entries {
                println!("    {}", key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_lifecycle_commands() {
        assert_eq!(Command::parse(&args(&["register"])).unwrap(), Command::Register);
        assert_eq!(Command::parse(&args(&["install"])).unwrap(), Command::Install);
        assert_eq!(Command::parse(&args(&["activate"])).unwrap(), Command::Activate);
        assert_eq!(Command::parse(&args(&[])).unwrap(), Command::Help);
    }

    #[test]
    fn test_parse_fetch_defaults_to_get() {
        let command = Command::parse(&args(&["fetch", "index.html"])).unwrap();
        assert_eq!(
            command,
            Command::Fetch {
                target: "index.html".to_string(),
                method: Method::GET,
                show_body: false,
            }
        );
    }

    #[test]
    fn test_parse_fetch_options() {
        let command =
            Command::parse(&args(&["fetch", "--method", "post", "api/data", "--body"])).unwrap();
        assert_eq!(
            command,
            Command::Fetch {
                target: "api/data".to_string(),
                method: Method::POST,
                show_body: true,
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(&args(&["fetch"])).is_err());
        assert!(Command::parse(&args(&["fetch", "a", "b"])).is_err());
        assert!(Command::parse(&args(&["fetch", "a", "--verbose"])).is_err());
        assert!(Command::parse(&args(&["install", "now"])).is_err());
        assert!(Command::parse(&args(&["serve"])).is_err());
    }

    // Nothing listens on the discard port, so every network fetch fails
    const UNREACHABLE_SCOPE: &str = "http://127.0.0.1:9/";

    fn config(cache_dir: &Path, version: &str) -> AgentConfig {
        AgentConfig {
            scope: UNREACHABLE_SCOPE.to_string(),
            cache_name: version.to_string(),
            request_timeout_secs: 2,
            cache_dir: Some(cache_dir.to_path_buf()),
            ..Default::default()
        }
    }

    async fn seed_active_v1(cache_dir: &Path) -> Url {
        let index = Url::parse(UNREACHABLE_SCOPE).unwrap().join("index.html").unwrap();
        let store = DiskStore::new(cache_dir).unwrap();
        store
            .put("v1", Request::get(index.clone()).key(), Response::ok("<html>v1</html>"))
            .await
            .unwrap();

        let mut registration = Registration::new(cache_dir.to_path_buf());
        registration.record(RegistrationData::new("v1", AgentState::Activated, true));
        registration.save().unwrap();
        index
    }

    #[tokio::test]
    async fn test_failed_upgrade_keeps_serving_active_version() {
        let dir = tempfile::tempdir().unwrap();
        let index = seed_active_v1(dir.path()).await;

        let mut runtime = Runtime::open(&config(dir.path(), "v2"), dir.path()).unwrap();
        assert!(runtime.install().await.is_err());
        assert_eq!(runtime.agent.state(), AgentState::Redundant);

        // Next run with the new config still serves v1 from cache
        let runtime = Runtime::open(&config(dir.path(), "v2"), dir.path()).unwrap();
        assert_eq!(runtime.controller().version(), "v1");
        let (source, response) = runtime.serve(&Request::get(index.clone())).await.unwrap();
        assert_eq!(source, "cache");
        assert_eq!(response.body_text(), "<html>v1</html>");

        // Going back to the old config resumes v1 directly
        let runtime = Runtime::open(&config(dir.path(), "v1"), dir.path()).unwrap();
        assert_eq!(runtime.agent.state(), AgentState::Activated);
        assert!(runtime.previous.is_none());
        let (source, _) = runtime.serve(&Request::get(index)).await.unwrap();
        assert_eq!(source, "cache");
    }

    #[tokio::test]
    async fn test_new_version_without_active_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::open(&config(dir.path(), "v1"), dir.path()).unwrap();
        assert_eq!(runtime.controller().version(), "v1");

        let url = Url::parse(UNREACHABLE_SCOPE).unwrap().join("index.html").unwrap();
        let err = runtime.serve(&Request::get(url)).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to load"));
    }
}
