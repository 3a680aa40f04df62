//! # Flux
//!
//! Real-time relay and matchmaking between browser clients and a game
//! client.
//!
//! Browsers connect over WebSocket and speak JSON. The game connects over
//! TCP and speaks `/key=value$` records. Flux seats every browser user on
//! a team, relays their gestures to the game, and applies the game's
//! merge and burst decisions back to the roster.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flux::prelude::*;
//!
//! # async fn start() -> Result<(), FluxError> {
//! let server = FluxServer::builder()
//!     .config(RelayConfig::from_env())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod connection;
pub mod dispatcher;
mod error;
pub mod handlers;
pub mod logging;
mod server;

pub use config::RelayConfig;
pub use dispatcher::{Dispatcher, Event, HandlerError, HandlerResult, Packet};
pub use error::FluxError;
pub use server::{FluxServer, FluxServerBuilder};

pub mod prelude {
    pub use crate::{FluxError, FluxServer, FluxServerBuilder, RelayConfig};

    pub use flux_hub::HubConfig;
    pub use flux_protocol::{TeamId, UserId, WireFormat};
    pub use flux_store::{MemoryStore, Store};
    pub use flux_team::{TeamConfig, TeamHandle, TeamStats};
}
