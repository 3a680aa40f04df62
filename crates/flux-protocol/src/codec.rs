//! Codecs and format detection.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! Flux speaks two formats, one per client population:
//!
//! - [`JsonCodec`] for browsers (via `serde_json`)
//! - [`DelimitedCodec`] for game clients (`/key=value$`, see
//!   [`crate::delimited`])
//!
//! Callers that should not care which population they are talking to go
//! through [`WireFormat`] and [`decode`], which pick the codec for them.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::delimited::{DelimitedDecode, DelimitedEncode, FieldMap, FieldWriter};
use crate::ProtocolError;

/// A codec that can encode serde types to bytes and decode bytes back.
///
/// - `Send + Sync` → safe to share between tasks.
/// - `'static` → the codec owns everything it needs.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use flux_protocol::{Codec, JsonCodec, Reply};
///
/// let reply = Reply::new("server:createId", 3).unwrap();
/// let bytes = JsonCodec.encode(&reply).unwrap();
/// assert_eq!(bytes, br#"{"name":"server:createId","message":3}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// DelimitedCodec
// ---------------------------------------------------------------------------

/// Codec for the game-client record format.
///
/// Not a [`Codec`]: it is driven by the [`DelimitedEncode`] and
/// [`DelimitedDecode`] schemas rather than by serde.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedCodec;

impl DelimitedCodec {
    /// Encodes one record, terminated by `$`.
    pub fn encode<T: DelimitedEncode + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut out = FieldWriter::new();
        value.encode_fields(&mut out);
        out.finish()
    }

    /// Encodes an optional value; `None` becomes the literal `Null`.
    pub fn encode_optional<T: DelimitedEncode + ?Sized>(
        &self,
        value: Option<&T>,
    ) -> Result<Vec<u8>, ProtocolError> {
        match value {
            Some(value) => self.encode(value),
            None => Ok(b"Null".to_vec()),
        }
    }

    /// Decodes the first record in `data`.
    pub fn decode<T: DelimitedDecode>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        let fields = FieldMap::parse(data)?;
        T::decode_fields(&fields)
    }
}

// ---------------------------------------------------------------------------
// Format selection
// ---------------------------------------------------------------------------

/// A value that can travel to either client population.
pub trait WireEncode: Serialize + DelimitedEncode {}

impl<T: Serialize + DelimitedEncode + ?Sized> WireEncode for T {}

/// A value that can be read from either client population.
pub trait WireDecode: DeserializeOwned + DelimitedDecode {}

impl<T: DeserializeOwned + DelimitedDecode> WireDecode for T {}

/// The encoding a client population speaks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Browser clients.
    Json,
    /// Game clients.
    Delimited,
}

impl WireFormat {
    /// Guesses the format from the first byte: `/` is delimited,
    /// anything else is treated as JSON.
    pub fn detect(data: &[u8]) -> Self {
        match data.first() {
            Some(b'/') => Self::Delimited,
            _ => Self::Json,
        }
    }

    /// Encodes `value` in this format.
    pub fn encode<T: WireEncode + ?Sized>(
        self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Self::Json => JsonCodec.encode(value),
            Self::Delimited => DelimitedCodec.encode(value),
        }
    }
}

/// Decodes `data` in whichever format it is in.
///
/// # Errors
/// Empty input, and delimited input shorter than
/// [`MIN_RECORD_LEN`](crate::MIN_RECORD_LEN), fail with
/// [`ProtocolError::Malformed`].
pub fn decode<T: WireDecode>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::Malformed("empty message".into()));
    }
    match WireFormat::detect(data) {
        WireFormat::Json => JsonCodec.decode(data),
        WireFormat::Delimited => DelimitedCodec.decode(data),
    }
}
