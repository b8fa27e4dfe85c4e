//! Network access for cache misses and manifest population.
//!
//! `NetworkClient` is the seam the lifecycle handlers fetch through;
//! `HttpClient` is the reqwest-backed implementation used at runtime.

pub mod client;

pub use client::{HttpClient, NetworkClient};
