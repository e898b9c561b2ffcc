//! Sync protocol client: local intents out, hub broadcasts in.
//!
//! ```text
//!  edit ──► RoomState::apply_document (optimistic)
//!       ──► update-document { roomId, content }     (hub stores)
//!       ──► request-document-sync { roomId }        (hub re-broadcasts)
//!
//!  document-changed { content } ──► RoomState::apply_document
//! ```
//!
//! The originator never filters its own echo: every member, the sender
//! included, converges through the same inbound path. Emission is
//! fire-and-forget; a failed emit is logged and otherwise ignored.

use crate::identity::Identity;
use crate::presence::NoticeId;
use crate::protocol::{ClientMessage, Language, ProtocolError, RoomId, ServerMessage};
use crate::store::RoomState;

/// An ordered, bidirectional connection to the relay hub.
///
/// Only the outbound half lives here; inbound messages are fed to
/// [`SyncClient::apply`] by whoever drives the event loop.
pub trait Channel {
    /// Queue a message for the hub. Must not block.
    fn emit(&mut self, msg: &ClientMessage) -> Result<(), ProtocolError>;

    /// Tear the connection down. Best effort; does not wait for the hub.
    fn close(&mut self);

    /// Whether the connection is currently usable.
    fn is_connected(&self) -> bool;
}

/// What an inbound message did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Document { changed: bool },
    Language { changed: bool },
    Membership { changed: bool },
    Joined(NoticeId),
    Left(NoticeId),
}

impl Applied {
    /// Whether the rendered room needs a repaint.
    pub fn changed(&self) -> bool {
        match self {
            Applied::Document { changed }
            | Applied::Language { changed }
            | Applied::Membership { changed } => *changed,
            Applied::Joined(_) | Applied::Left(_) => true,
        }
    }
}

/// Protocol client bound to one room over one channel.
pub struct SyncClient<C> {
    room_id: RoomId,
    channel: C,
}

impl<C: Channel> SyncClient<C> {
    pub fn new(room_id: RoomId, channel: C) -> Self {
        Self { room_id, channel }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Register `identity` with the room.
    pub fn join(&mut self, identity: &Identity) {
        self.send(ClientMessage::Join {
            room_id: self.room_id,
            identity: identity.clone(),
        });
    }

    /// Local edit: update the store, store on the hub, then ask for a
    /// room-wide broadcast.
    pub fn update_document(&mut self, state: &mut RoomState, content: impl Into<String>) {
        let content = content.into();
        state.apply_document(content.clone());

        self.send(ClientMessage::UpdateDocument {
            room_id: self.room_id,
            content,
        });
        self.send(ClientMessage::RequestDocumentSync { room_id: self.room_id });
    }

    /// Local language switch, same two-phase shape as document edits.
    pub fn update_language(&mut self, state: &mut RoomState, language: Language) {
        state.apply_language(language);

        self.send(ClientMessage::UpdateLanguage {
            room_id: self.room_id,
            language,
        });
        self.send(ClientMessage::RequestLanguageSync { room_id: self.room_id });
    }

    /// Apply one hub message to the store.
    pub fn apply(&self, state: &mut RoomState, msg: ServerMessage) -> Applied {
        match msg {
            ServerMessage::DocumentChanged { content } => {
                log::trace!("Room {}: document-changed ({} bytes)", self.room_id, content.len());
                Applied::Document { changed: state.apply_document(content) }
            }
            ServerMessage::LanguageChanged { language } => {
                log::debug!("Room {}: language-changed to {language}", self.room_id);
                Applied::Language { changed: state.apply_language(language) }
            }
            ServerMessage::MembershipUpdated { members } => {
                log::debug!("Room {}: membership-updated ({} members)", self.room_id, members.len());
                Applied::Membership { changed: state.apply_membership(members) }
            }
            ServerMessage::MemberJoined { identity } => Applied::Joined(state.note_joined(&identity)),
            ServerMessage::MemberLeft { identity } => Applied::Left(state.note_left(&identity)),
        }
    }

    /// Tell the hub we are leaving and close the channel.
    pub fn leave(&mut self) {
        self.send(ClientMessage::Leave);
        self.channel.close();
        log::info!("Room {}: channel closed", self.room_id);
    }

    fn send(&mut self, msg: ClientMessage) {
        match self.channel.emit(&msg) {
            Ok(()) => log::debug!("Room {}: emitted {}", self.room_id, msg.event_name()),
            Err(e) => log::warn!("Room {}: failed to emit {}: {e}", self.room_id, msg.event_name()),
        }
    }
}

/// In-memory channel that records every emitted message.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct RecordingChannel {
    pub sent: Vec<ClientMessage>,
    pub connected: bool,
    /// Keep reporting "connected" after `close`, like a transport that
    /// tears down asynchronously.
    pub lingers_after_close: bool,
    pub closed: bool,
}

#[cfg(test)]
impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            connected: true,
            lingers_after_close: false,
            closed: false,
        }
    }
}

#[cfg(test)]
impl Channel for RecordingChannel {
    fn emit(&mut self, msg: &ClientMessage) -> Result<(), ProtocolError> {
        if !self.connected {
            return Err(ProtocolError::ConnectionClosed);
        }
        self.sent.push(msg.clone());
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        if !self.lingers_after_close {
            self.connected = false;
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
