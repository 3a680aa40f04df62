//! Error types for the protocol layer.
//!
//! Each crate in Flux defines its own error enum, so a `ProtocolError`
//! always means the problem is in encoding or decoding, never in
//! networking or matchmaking.

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// JSON serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// JSON deserialization failed: malformed JSON, missing required
    /// fields or wrong data types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The input is too short, not UTF-8, or otherwise not a record.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A delimited record lacks a field the destination type requires.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A text value would break delimited framing.
    #[error("field `{field}` contains reserved character {ch:?}")]
    ReservedCharacter { field: String, ch: char },

    /// The message decoded but violates protocol rules, e.g. an event
    /// envelope with no events in it.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
