//! Error types for the team layer.

use flux_protocol::TeamId;
use flux_store::StoreError;

/// Errors that can occur during team operations.
#[derive(Debug, thiserror::Error)]
pub enum TeamError {
    /// The team does not exist.
    #[error("team {0} not found")]
    NotFound(TeamId),

    /// A team cannot be merged into itself.
    #[error("cannot merge team {0} into itself")]
    SameTeam(TeamId),

    /// A store operation the engine could not continue without failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The engine task has stopped.
    #[error("team engine is unavailable")]
    Unavailable,
}
