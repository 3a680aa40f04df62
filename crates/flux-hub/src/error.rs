//! Error types for the hub layer.

use flux_transport::ConnectionId;

/// Errors that can occur when talking to a hub or a client queue.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The client's output queue is at capacity. The hub treats this as
    /// a dead client.
    #[error("output queue for {0} is full")]
    Full(ConnectionId),

    /// The client has been closed; nothing more can be written to it.
    #[error("client {0} is closed")]
    Closed(ConnectionId),

    /// The hub task has stopped and no longer accepts commands.
    #[error("hub `{0}` is unavailable")]
    Unavailable(&'static str),
}
