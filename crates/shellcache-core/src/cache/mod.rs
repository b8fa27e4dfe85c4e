//! Cache generation storage.
//!
//! A cache generation is a named, versioned snapshot of app shell
//! responses. The `CacheStore` trait is the only way handlers touch
//! storage, so the same lifecycle logic runs against:
//! - `MemoryStore`: in-process maps, used in tests and short-lived runs
//! - `DiskStore`: JSON files under the cache directory

pub mod manager;
pub mod memory;
pub mod store;

pub use manager::{CachedData, DiskStore};
pub use memory::MemoryStore;
pub use store::{validate_generation, CacheStore};
