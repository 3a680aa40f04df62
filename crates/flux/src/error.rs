//! Unified error type for the Flux relay.

use flux_hub::HubError;
use flux_protocol::ProtocolError;
use flux_store::StoreError;
use flux_team::TeamError;
use flux_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum FluxError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed record).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A hub stopped or rejected a write.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A team operation failed.
    #[error(transparent)]
    Team(#[from] TeamError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::FrameTooLarge { limit: 4096 };
        let flux_err: FluxError = err.into();
        assert!(matches!(flux_err, FluxError::Transport(_)));
        assert!(flux_err.to_string().contains("4096"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::MissingField("id".into());
        let flux_err: FluxError = err.into();
        assert!(matches!(flux_err, FluxError::Protocol(_)));
        assert!(flux_err.to_string().contains("id"));
    }

    #[test]
    fn test_from_team_error() {
        let err = TeamError::NotFound(flux_protocol::TeamId(4));
        let flux_err: FluxError = err.into();
        assert!(matches!(flux_err, FluxError::Team(_)));
    }

    #[test]
    fn test_from_store_error() {
        let err = StoreError::NotAnInteger("global:nextTeamId".into());
        let flux_err: FluxError = err.into();
        assert!(matches!(flux_err, FluxError::Store(_)));
    }
}
