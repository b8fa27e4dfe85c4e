//! Data models for the app shell cache.
//!
//! - `Request`, `RequestKey`: intercepted requests and their cache identity
//! - `Response`: a stored or network response
//! - `Manifest`: the fixed list of app shell resources

pub mod manifest;
pub mod request;
pub mod response;

pub use manifest::Manifest;
pub use request::{Request, RequestKey};
pub use response::Response;
