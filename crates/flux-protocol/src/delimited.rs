//! The game-client text format: `/key=value/key=value$`.
//!
//! Types opt in by describing their own fields, in order, through
//! [`DelimitedEncode`] and [`DelimitedDecode`]. The schema is ordinary
//! code, so field order, wire names and skipped fields are fixed at
//! compile time:
//!
//! ```rust
//! use flux_protocol::{DelimitedEncode, FieldWriter, DelimitedCodec};
//!
//! struct Join { name: String, id: i64, secret: String }
//!
//! impl DelimitedEncode for Join {
//!     fn encode_fields(&self, out: &mut FieldWriter) {
//!         // `secret` is never written: skipped on the wire.
//!         out.text("Name", &self.name).int("Id", self.id);
//!     }
//! }
//!
//! let join = Join { name: "join".into(), id: 7, secret: "x".into() };
//! let bytes = DelimitedCodec.encode(&join).unwrap();
//! assert_eq!(bytes, b"/Name=join/Id=7$");
//! ```
//!
//! Only text and integer leaves exist. Nested records are inlined: their
//! fields follow the parent's in order, with no prefix.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::ProtocolError;

/// Inputs shorter than this cannot hold a single `/k=v$` record.
pub const MIN_RECORD_LEN: usize = 5;

/// Characters that frame the format and may not appear in text values.
const RESERVED: [char; 3] = ['/', '=', '$'];

/// Literal written for an absent record.
const NULL: &str = "Null";

/// A type that can write itself as delimited fields.
///
/// Implementations call [`FieldWriter`] methods once per field, in
/// declaration order. A field that is not written is skipped.
pub trait DelimitedEncode {
    fn encode_fields(&self, out: &mut FieldWriter);
}

/// A type that can populate itself from a parsed delimited record.
pub trait DelimitedDecode: Sized {
    fn decode_fields(fields: &FieldMap<'_>) -> Result<Self, ProtocolError>;
}

/// Sequence-of-one convention: a record decodes into a one-element
/// `Vec`, mirroring the JSON event envelope `[{...}]`.
impl<T: DelimitedDecode> DelimitedDecode for Vec<T> {
    fn decode_fields(fields: &FieldMap<'_>) -> Result<Self, ProtocolError> {
        Ok(vec![T::decode_fields(fields)?])
    }
}

/// Accumulates `/name=value` pairs for one record.
///
/// The first invalid value is remembered and reported when the record
/// is finished; later writes are still accepted so that schema code can
/// chain calls without checking each one.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: String,
    error: Option<ProtocolError>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a text field.
    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        if let Some(ch) = value.chars().find(|c| RESERVED.contains(c)) {
            if self.error.is_none() {
                self.error = Some(ProtocolError::ReservedCharacter {
                    field: name.to_owned(),
                    ch,
                });
            }
            return self;
        }
        self.push(name, value)
    }

    /// Writes an integer field.
    pub fn int(&mut self, name: &str, value: impl Into<i64>) -> &mut Self {
        let _ = write!(self.buf, "/{name}={}", value.into());
        self
    }

    /// Inlines a nested record, or writes `/name=Null` when it is absent.
    pub fn nested<T: DelimitedEncode + ?Sized>(
        &mut self,
        name: &str,
        value: Option<&T>,
    ) -> &mut Self {
        match value {
            Some(inner) => inner.encode_fields(self),
            None => {
                self.push(name, NULL);
            }
        }
        self
    }

    fn push(&mut self, name: &str, value: &str) -> &mut Self {
        self.buf.push('/');
        self.buf.push_str(name);
        self.buf.push('=');
        self.buf.push_str(value);
        self
    }

    /// Terminates the record.
    pub fn finish(mut self) -> Result<Vec<u8>, ProtocolError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.buf.push('$');
        Ok(self.buf.into_bytes())
    }
}

/// One parsed record: wire name → raw value text.
#[derive(Debug)]
pub struct FieldMap<'a> {
    raw: &'a [u8],
    fields: HashMap<&'a str, &'a str>,
}

impl<'a> FieldMap<'a> {
    /// Parses the first record in `raw`; bytes after its `$` are ignored.
    ///
    /// Tokens that do not contain exactly one `=` are skipped.
    pub fn parse(raw: &'a [u8]) -> Result<Self, ProtocolError> {
        if raw.len() < MIN_RECORD_LEN {
            return Err(ProtocolError::Malformed(format!(
                "record too short ({} bytes)",
                raw.len()
            )));
        }

        let end = raw.iter().position(|b| *b == b'$').unwrap_or(raw.len());
        let record = std::str::from_utf8(&raw[..end])
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let fields = record
            .split('/')
            .filter_map(|token| {
                let mut parts = token.split('=');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(key), Some(value), None) => Some((key, value)),
                    _ => None,
                }
            })
            .collect();

        Ok(Self { raw, fields })
    }

    /// The complete input buffer this record was parsed from.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.fields.get(name).copied()
    }

    /// Reads a required text field.
    pub fn text(&self, name: &str) -> Result<String, ProtocolError> {
        self.get(name)
            .map(str::to_owned)
            .ok_or_else(|| ProtocolError::MissingField(name.to_owned()))
    }

    /// Reads a required integer field.
    ///
    /// Game clients have historically sent placeholder text in numeric
    /// slots, so a value that does not parse becomes 0 with a warning
    /// instead of failing the whole record.
    pub fn int(&self, name: &str) -> Result<i64, ProtocolError> {
        let value = self
            .get(name)
            .ok_or_else(|| ProtocolError::MissingField(name.to_owned()))?;
        Ok(value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(
                field = name,
                value,
                "non-numeric value in integer field, using 0"
            );
            0
        }))
    }

    /// Reads an inlined nested record.
    pub fn nested<T: DelimitedDecode>(&self) -> Result<T, ProtocolError> {
        T::decode_fields(self)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position {
        id: i64,
        x: i64,
        y: i64,
    }

    impl DelimitedDecode for Position {
        fn decode_fields(fields: &FieldMap<'_>) -> Result<Self, ProtocolError> {
            Ok(Self {
                id: fields.int("id")?,
                x: fields.int("x")?,
                y: fields.int("y")?,
            })
        }
    }

    struct Rgb(u8, u8, u8);

    impl DelimitedEncode for Rgb {
        fn encode_fields(&self, out: &mut FieldWriter) {
            out.int("r", self.0).int("g", self.1).int("b", self.2);
        }
    }

    struct Painted<'a> {
        name: &'a str,
        color: Option<Rgb>,
    }

    impl DelimitedEncode for Painted<'_> {
        fn encode_fields(&self, out: &mut FieldWriter) {
            out.text("name", self.name)
                .nested("color", self.color.as_ref());
        }
    }

    fn encode(value: &impl DelimitedEncode) -> Result<Vec<u8>, ProtocolError> {
        let mut out = FieldWriter::new();
        value.encode_fields(&mut out);
        out.finish()
    }

    #[test]
    fn test_parse_reads_signed_integers() {
        let fields = FieldMap::parse(b"/id=4/x=10/y=-3$").unwrap();
        let pos: Position = fields.nested().unwrap();
        assert_eq!(pos, Position { id: 4, x: 10, y: -3 });
    }

    #[test]
    fn test_parse_rejects_short_input() {
        let err = FieldMap::parse(b"/a$").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_parse_ignores_everything_after_first_terminator() {
        let fields = FieldMap::parse(b"/id=1$/id=2/extra=3$").unwrap();
        assert_eq!(fields.get("id"), Some("1"));
        assert_eq!(fields.get("extra"), None);
        assert_eq!(fields.raw(), b"/id=1$/id=2/extra=3$");
    }

    #[test]
    fn test_parse_skips_tokens_without_exactly_one_equals() {
        let fields = FieldMap::parse(b"/id=1/junk/a=b=c/x=2$").unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("a"), None);
        assert_eq!(fields.get("x"), Some("2"));
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let fields = FieldMap::parse(b"/id=4/x=10$").unwrap();
        let err = Position::decode_fields(&fields).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField(f) if f == "y"));
    }

    #[test]
    fn test_non_numeric_integer_defaults_to_zero() {
        let fields = FieldMap::parse(b"/id=abc/x=1/y=2$").unwrap();
        let pos = Position::decode_fields(&fields).unwrap();
        assert_eq!(pos.id, 0);
    }

    #[test]
    fn test_sequence_of_one_manufactures_single_element() {
        let fields = FieldMap::parse(b"/id=1/x=2/y=3$").unwrap();
        let seq: Vec<Position> = Vec::decode_fields(&fields).unwrap();
        assert_eq!(seq, vec![Position { id: 1, x: 2, y: 3 }]);
    }

    #[test]
    fn test_nested_record_is_inlined() {
        let value = Painted { name: "collector:new", color: Some(Rgb(255, 0, 0)) };
        assert_eq!(
            encode(&value).unwrap(),
            b"/name=collector:new/r=255/g=0/b=0$"
        );
    }

    #[test]
    fn test_absent_nested_record_writes_null() {
        let value = Painted { name: "collector:new", color: None };
        assert_eq!(encode(&value).unwrap(), b"/name=collector:new/color=Null$");
    }

    #[test]
    fn test_reserved_character_fails_encode() {
        let value = Painted { name: "a/b", color: None };
        let err = encode(&value).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ReservedCharacter { ch: '/', .. }
        ));
    }
}
