//! Matchmaking for Flux.
//!
//! Browser users are seated on teams ("collectors") that the game
//! renders. The engine keeps team sizes balanced as users come and go,
//! merges teams when the game asks, and evicts users that stop sending
//! heartbeats.
//!
//! # Key types
//!
//! - [`TeamHandle`]: send commands to the running engine
//! - [`spawn_team_engine`]: start the engine task
//! - [`Roster`], [`Team`], [`Member`], [`User`]: the in-memory state
//! - [`TeamConfig`]: badge threshold, presence window, pass intervals
//!
//! Durable records (ids, badges, presence) go through a
//! [`Store`](flux_store::Store); the helpers in [`users`] write the ones
//! that exist before a user is seated.

mod config;
mod error;
mod manager;
mod roster;
pub mod users;

pub use config::{PALETTE, TeamConfig};
pub use error::TeamError;
pub use manager::{TeamHandle, TeamStats, TeamSummary, spawn_team_engine};
pub use roster::{Member, Roster, Team, User};
