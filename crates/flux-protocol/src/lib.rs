//! Wire protocol for Flux.
//!
//! This crate defines the two "languages" the relay speaks:
//!
//! - **Types** ([`EventFrame`], [`Reply`], [`Notice`], etc.): the
//!   structures that travel on the wire.
//! - **Codecs** ([`JsonCodec`] for browsers, [`DelimitedCodec`] for game
//!   clients) and [`WireFormat`], which picks one per client.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the hub and
//! dispatcher. It doesn't know about connections or teams; it only knows
//! how to turn bytes into events and notices into bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (EventFrame) → Dispatcher (handlers)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
pub mod delimited;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{
    Codec, DelimitedCodec, JsonCodec, WireDecode, WireEncode, WireFormat,
    decode,
};
pub use delimited::{
    DelimitedDecode, DelimitedEncode, FieldMap, FieldWriter, MIN_RECORD_LEN,
};
pub use error::ProtocolError;
pub use types::{
    Badge, BadgeAwarded, Color, Coords, EventFrame, JoinRequest,
    MergeRequest, Notice, Registered, Reply, TeamChanged, TeamCreated,
    TeamId, TeamRef, TouchForward, UserId, UserRef, event,
};
