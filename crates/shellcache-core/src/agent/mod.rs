//! Lifecycle handling for the app shell cache agent.
//!
//! The three lifecycle signals map to free functions in `handlers`
//! (`on_install`, `on_activate`, `on_fetch`) that take the store and network
//! explicitly. `Agent` wraps them with the lifecycle state machine the
//! hosting runtime drives.

pub mod handlers;
pub mod lifecycle;
pub mod state;

pub use handlers::{on_activate, on_fetch, on_install, ActivateOutcome, FetchOutcome, InstallOutcome};
pub use lifecycle::{Agent, FetchHandle};
pub use state::AgentState;
