//! Core library for shellcache.
//!
//! An offline caching agent for a single web application ("App Shell"):
//! the manifest is cached eagerly on install, stale cache generations are
//! removed on activate, and GET requests are served cache-first with a
//! network fallback.
//!
//! - `agent`: lifecycle handlers and the `Agent` state machine
//! - `cache`: the `CacheStore` interface with in-memory and on-disk stores
//! - `network`: the `NetworkClient` interface and a reqwest-backed client
//! - `models`: requests, responses and the manifest
//! - `registration`: persisted lifecycle state between runs
//! - `config`: agent configuration

pub mod agent;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod registration;
pub mod utils;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentState, FetchHandle, FetchOutcome};
pub use cache::{CacheStore, DiskStore, MemoryStore};
pub use config::AgentConfig;
pub use error::{AgentError, NetworkError, StoreError};
pub use models::{Manifest, Request, RequestKey, Response};
pub use network::{HttpClient, NetworkClient};
pub use registration::{Registration, RegistrationData};

pub use reqwest::{Method, Url};
