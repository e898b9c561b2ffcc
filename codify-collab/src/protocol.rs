//! JSON wire protocol between room clients and the relay hub.
//!
//! Every frame is one JSON object, adjacently tagged:
//! ```text
//! { "event": "update-document", "data": { "roomId": "…", "content": "…" } }
//! ```
//!
//! Client → hub: `join`, `update-document`, `request-document-sync`,
//! `update-language`, `request-language-sync`, `leave`.
//!
//! Hub → client: `membership-updated`, `language-changed`,
//! `document-changed`, `member-joined`, `member-left`.
//!
//! Document and language changes always travel as a pair: an `update-*`
//! that stores the value on the hub, then a `request-*-sync` that makes the
//! hub broadcast its canonical value to every member, sender included.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::{Uuid, Variant};

use crate::identity::Identity;

/// Length of the canonical hyphenated UUID form.
const HYPHENATED_LEN: usize = 36;

/// Errors raised by local input validation, before any channel activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Incorrect room ID: {0:?}")]
    InvalidRoomId(String),
    #[error("Username must not be empty")]
    EmptyIdentity,
}

/// Errors raised while encoding, decoding or moving frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Deserialization error: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Room identifier. Always a valid UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(Uuid);

impl RoomId {
    /// Validate user input as a room identifier.
    ///
    /// Only the hyphenated 36-character form is accepted (any case). The
    /// UUID must carry the RFC 4122 variant and a version in 1..=8, unless it
    /// is the nil or max UUID.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidRoomId(input.to_string());

        if input.len() != HYPHENATED_LEN {
            return Err(invalid());
        }
        let uuid = Uuid::try_parse(input).map_err(|_| invalid())?;

        if uuid.is_nil() || uuid == Uuid::from_u128(u128::MAX) {
            return Ok(Self(uuid));
        }
        let version_ok = (1..=8).contains(&uuid.get_version_num());
        if !version_ok || uuid.get_variant() != Variant::RFC4122 {
            return Err(invalid());
        }
        Ok(Self(uuid))
    }

    /// Mint a fresh random room identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for RoomId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RoomId> for String {
    fn from(room_id: RoomId) -> Self {
        room_id.to_string()
    }
}

impl FromStr for RoomId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// Editor language mode shared by the whole room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "javascript")]
    JavaScript,
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "c_cpp")]
    CCpp,
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "typescript")]
    TypeScript,
    #[serde(rename = "golang")]
    Go,
    #[serde(rename = "yaml")]
    Yaml,
    #[serde(rename = "html")]
    Html,
}

impl Language {
    /// Every selectable language, in menu order.
    pub const ALL: [Language; 8] = [
        Language::JavaScript,
        Language::Java,
        Language::CCpp,
        Language::Python,
        Language::TypeScript,
        Language::Go,
        Language::Yaml,
        Language::Html,
    ];

    /// Wire tag, also the editor mode name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Java => "java",
            Language::CCpp => "c_cpp",
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::Go => "golang",
            Language::Yaml => "yaml",
            Language::Html => "html",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str() == s)
            .ok_or_else(|| format!("unknown language: {s}"))
    }
}

/// Intents sent from a client to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Enter the room under the given identity.
    Join { room_id: RoomId, identity: Identity },
    /// Store new canonical document content.
    UpdateDocument { room_id: RoomId, content: String },
    /// Ask the hub to broadcast the canonical document to every member.
    RequestDocumentSync { room_id: RoomId },
    /// Store a new canonical language.
    UpdateLanguage { room_id: RoomId, language: Language },
    /// Ask the hub to broadcast the canonical language to every member.
    RequestLanguageSync { room_id: RoomId },
    /// Remove self from the room.
    Leave,
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }

    /// Wire event name, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::UpdateDocument { .. } => "update-document",
            ClientMessage::RequestDocumentSync { .. } => "request-document-sync",
            ClientMessage::UpdateLanguage { .. } => "update-language",
            ClientMessage::RequestLanguageSync { .. } => "request-language-sync",
            ClientMessage::Leave => "leave",
        }
    }
}

/// Broadcasts and notices sent from the hub to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Full, ordered membership snapshot.
    MembershipUpdated { members: Vec<Identity> },
    /// Canonical language of the room.
    LanguageChanged { language: Language },
    /// Canonical document content of the room.
    DocumentChanged { content: String },
    /// Someone entered the room.
    MemberJoined { identity: Identity },
    /// Someone left the room.
    MemberLeft { identity: Identity },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
