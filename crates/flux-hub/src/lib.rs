//! Connection registries for Flux.
//!
//! A hub tracks every live client of one population (browsers or game
//! clients) and fans messages out to all of them. It runs as an isolated
//! Tokio task (actor model): registration, removal and broadcast are
//! commands processed one at a time from a mailbox, so the client set
//! never needs a lock.
//!
//! # Key types
//!
//! - [`ClientHandle`]: the capability to enqueue bytes for one client
//!   and to close it
//! - [`Outbox`]: the receiving end a connection's writer task drains
//! - [`HubHandle`]: send commands to a running hub
//! - [`HubConfig`]: mailbox and queue sizes
//!
//! # How it fits in the stack
//!
//! ```text
//! Team engine / handlers (above)  ← broadcast notices
//!     ↕
//! Hub (this crate)                ← one client set per population
//!     ↕
//! Protocol + Transport (below)    ← encode once per format, write bytes
//! ```

mod client;
mod config;
mod error;
mod hub;

pub use client::{ClientHandle, Outbox, SendError};
pub use config::HubConfig;
pub use error::HubError;
pub use hub::{HubHandle, spawn_hub};
