//! Core protocol types: everything that travels on the wire.
//!
//! Inbound argument types implement both `Deserialize` and
//! [`DelimitedDecode`] so a handler can read them no matter which
//! population sent the event. Outbound notices implement both
//! `Serialize` and [`DelimitedEncode`] so a hub can fan them out to
//! either population.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::delimited::{DelimitedDecode, DelimitedEncode, FieldMap, FieldWriter};
use crate::ProtocolError;

/// Event names understood or emitted by the relay.
pub mod event {
    pub const USER_JOIN: &str = "user:join";
    pub const USER_HEARTBEAT: &str = "user:heartbeat";
    pub const USER_TOUCH: &str = "user:touch";
    pub const USER_TOUCH_END: &str = "user:touchEnd";
    pub const USER_BLOAT: &str = "user:bloat";
    pub const USER_PINCH: &str = "user:pinch";
    pub const USER_ATTACK: &str = "user:attack";
    pub const USER_SHOOT: &str = "user:shoot";
    /// Reserved: invoked by the dispatcher when a connection ends.
    pub const USER_DISCONNECT: &str = "user:disconnect";
    pub const USER_NEW_TEAM: &str = "user:newTeam";
    pub const USER_GET_BADGE: &str = "user:getBadge";
    pub const COLLECTOR_NEW: &str = "collector:new";
    pub const COLLECTOR_DESTROY: &str = "collector:destroy";
    pub const COLLECTOR_MERGE: &str = "collector:merge";
    pub const COLLECTOR_BURST: &str = "collector:burst";
    pub const SERVER_CREATE_ID: &str = "server:createId";
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A user's id, allocated from the `global:nextUserId` counter.
///
/// `#[serde(transparent)]` keeps it a plain number on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// A team ("collector") id, allocated from `global:nextTeamId`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TeamId> for i64 {
    fn from(id: TeamId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Inbound envelope and reply
// ---------------------------------------------------------------------------

/// One decoded inbound event, before a sender is attached.
///
/// JSON clients send `[{"name": ..., "args": ...}]`; `args` is kept as
/// raw JSON bytes. Game clients send one record with a `name` field; the
/// whole record is kept as `args` so handlers can read their own fields
/// from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "JsonEventFrame")]
pub struct EventFrame {
    pub name: String,
    pub args: Vec<u8>,
}

#[derive(Deserialize)]
struct JsonEventFrame {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

impl From<JsonEventFrame> for EventFrame {
    fn from(frame: JsonEventFrame) -> Self {
        let args = if frame.args.is_null() {
            Vec::new()
        } else {
            serde_json::to_vec(&frame.args).unwrap_or_default()
        };
        Self { name: frame.name, args }
    }
}

impl DelimitedDecode for EventFrame {
    fn decode_fields(fields: &FieldMap<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: fields.text("name")?,
            args: fields.raw().to_vec(),
        })
    }
}

impl EventFrame {
    /// Decodes an inbound packet in either format.
    ///
    /// Both formats go through the sequence-of-one envelope; only the
    /// first event is used.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let frames: Vec<EventFrame> = crate::decode(data)?;
        frames.into_iter().next().ok_or_else(|| {
            ProtocolError::InvalidMessage("empty event envelope".into())
        })
    }
}

/// The outbound JSON envelope: `{"name": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub name: String,
    pub message: serde_json::Value,
}

impl Reply {
    pub fn new(
        name: impl Into<String>,
        message: impl Serialize,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: name.into(),
            message: serde_json::to_value(message)
                .map_err(ProtocolError::Encode)?,
        })
    }
}

/// Body of the `server:createId` reply sent to a joining browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registered {
    pub id: UserId,
    pub team_id: TeamId,
}

// ---------------------------------------------------------------------------
// Inbound arguments
// ---------------------------------------------------------------------------

/// Arguments naming a single user: `{"id": 3}` or `/id=3$`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
}

impl DelimitedDecode for UserRef {
    fn decode_fields(fields: &FieldMap<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { id: UserId(fields.int("id")?) })
    }
}

/// A touch position reported by a browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coords {
    pub id: UserId,
    pub x: i64,
    pub y: i64,
}

impl DelimitedDecode for Coords {
    fn decode_fields(fields: &FieldMap<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            id: UserId(fields.int("id")?),
            x: fields.int("x")?,
            y: fields.int("y")?,
        })
    }
}

/// Arguments of `user:join`.
///
/// The delimited form uses `username` because `name` already carries the
/// event name in a game-client record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub name: String,
}

impl DelimitedDecode for JoinRequest {
    fn decode_fields(fields: &FieldMap<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { name: fields.text("username")? })
    }
}

/// Arguments of `collector:merge`, sent by the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub team_1: TeamId,
    pub team_2: TeamId,
}

impl DelimitedDecode for MergeRequest {
    fn decode_fields(fields: &FieldMap<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            team_1: TeamId(fields.int("team_1")?),
            team_2: TeamId(fields.int("team_2")?),
        })
    }
}

/// Arguments naming a single team, e.g. `collector:burst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: TeamId,
}

impl DelimitedDecode for TeamRef {
    fn decode_fields(fields: &FieldMap<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { id: TeamId(fields.int("id")?) })
    }
}

// ---------------------------------------------------------------------------
// Outbound notices
// ---------------------------------------------------------------------------

/// An RGB team color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Self = Self { r: 255, g: 0, b: 0 };
    pub const GREEN: Self = Self { r: 0, g: 255, b: 0 };
    pub const BLUE: Self = Self { r: 0, g: 0, b: 255 };
    pub const WHITE: Self = Self { r: 255, g: 255, b: 255 };
}

impl DelimitedEncode for Color {
    fn encode_fields(&self, out: &mut FieldWriter) {
        out.int("r", self.r).int("g", self.g).int("b", self.b);
    }
}

/// The smallest notice: an event name and one id.
///
/// Used for `user:join`, `user:disconnect`, `collector:destroy` and the
/// forwarded browser gestures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub name: String,
    pub id: i64,
}

impl Notice {
    pub fn new(name: impl Into<String>, id: impl Into<i64>) -> Self {
        Self { name: name.into(), id: id.into() }
    }
}

impl DelimitedEncode for Notice {
    fn encode_fields(&self, out: &mut FieldWriter) {
        out.text("name", &self.name).int("id", self.id);
    }
}

/// `collector:new`: a team was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCreated {
    pub name: String,
    pub id: TeamId,
    pub color: Color,
}

impl TeamCreated {
    pub fn new(id: TeamId, color: Color) -> Self {
        Self { name: event::COLLECTOR_NEW.into(), id, color }
    }
}

impl DelimitedEncode for TeamCreated {
    fn encode_fields(&self, out: &mut FieldWriter) {
        out.text("name", &self.name)
            .int("id", self.id)
            .nested("color", Some(&self.color));
    }
}

/// `user:newTeam`: a user was moved to another team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamChanged {
    pub name: String,
    pub id: UserId,
    #[serde(rename = "teamId")]
    pub team_id: TeamId,
}

impl TeamChanged {
    pub fn new(id: UserId, team_id: TeamId) -> Self {
        Self { name: event::USER_NEW_TEAM.into(), id, team_id }
    }
}

impl DelimitedEncode for TeamChanged {
    fn encode_fields(&self, out: &mut FieldWriter) {
        out.text("name", &self.name)
            .int("id", self.id)
            .int("teamId", self.team_id);
    }
}

/// Durable achievement markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Badge {
    /// The user's team reached the population threshold.
    TheOcho,
    /// The user's team took part in a merge.
    FirstMerge,
    /// The user fired more than two shots in one analytics window.
    TriggerHappy,
}

impl Badge {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TheOcho => "theOcho",
            Self::FirstMerge => "firstMerge",
            Self::TriggerHappy => "triggerHappy",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `user:getBadge`: a badge was awarded for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeAwarded {
    pub name: String,
    #[serde(rename = "type")]
    pub badge: Badge,
    pub id: UserId,
}

impl BadgeAwarded {
    pub fn new(badge: Badge, id: UserId) -> Self {
        Self { name: event::USER_GET_BADGE.into(), badge, id }
    }
}

impl DelimitedEncode for BadgeAwarded {
    fn encode_fields(&self, out: &mut FieldWriter) {
        out.text("name", &self.name)
            .text("type", self.badge.as_str())
            .int("id", self.id);
    }
}

/// `user:touch` forwarded to the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchForward {
    pub name: String,
    pub id: UserId,
    pub x: i64,
    pub y: i64,
}

impl From<Coords> for TouchForward {
    fn from(pos: Coords) -> Self {
        Self {
            name: event::USER_TOUCH.into(),
            id: pos.id,
            x: pos.x,
            y: pos.y,
        }
    }
}

impl DelimitedEncode for TouchForward {
    fn encode_fields(&self, out: &mut FieldWriter) {
        out.text("name", &self.name)
            .int("id", self.id)
            .int("x", self.x)
            .int("y", self.y);
    }
}

// =========================================================================
// Tests
// =========================================================================
