//! Session lifecycle: entry validation, join, leave, implicit leave.
//!
//! ```text
//!  Disconnected ──join──► Joining ──membership incl. self──► Joined
//!       ▲                    │                                 │
//!       │                    └──────── leave / back-nav ───────┤
//!       │                                                      ▼
//!       └──────────── channel reports not connected ────── Leaving
//! ```
//!
//! The controller never touches a platform directly. Navigation, clipboard
//! and the resize / history notifications all go through [`Environment`],
//! which the controller subscribes to while a room is open.
//!
//! There is no reconnection: losing the channel ends the session.

use thiserror::Error;

use crate::identity::Identity;
use crate::presence::{NoticeBoard, NoticeId, NoticeKind, PresenceTracker};
use crate::protocol::{Language, RoomId, ServerMessage, ValidationError};
use crate::store::{Keybinding, RoomState};
use crate::sync::{Applied, Channel, SyncClient};

/// Lifecycle state of the one room a client can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Joining,
    Joined,
    Leaving,
}

/// Screens the controller can navigate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Landing screen. Entered with replace semantics and empty history state.
    Entry,
    /// Room screen; the identity travels as the history entry's claim.
    Room { room_id: RoomId, identity: Identity },
}

/// History entry reached by back/forward navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryEntry {
    pub identity: Option<Identity>,
}

/// Editor viewport size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Notification kinds the controller can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvTopic {
    Resize,
    Navigation,
}

/// Notification delivered by the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvEvent {
    Resized(Viewport),
    Navigated(HistoryEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    #[error("Clipboard write failed: {0}")]
    Clipboard(String),
}

/// Platform services used by the controller.
pub trait Environment {
    /// Start delivering the given notifications to the controller.
    fn subscribe(&mut self, topics: &[EnvTopic]) -> SubscriptionId;

    fn unsubscribe(&mut self, id: SubscriptionId);

    fn navigate(&mut self, route: Route);

    fn write_clipboard(&mut self, text: &str) -> Result<(), EnvironmentError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Cannot {action} while {state:?}")]
    InvalidState { action: &'static str, state: SessionState },
}

/// A validated request to enter a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub room_id: RoomId,
    pub identity: Identity,
}

impl JoinRequest {
    /// Validate the entry form. The room id is checked first.
    pub fn parse(room_id: &str, username: &str) -> Result<Self, ValidationError> {
        let room_id = RoomId::parse(room_id)?;
        let identity = Identity::new(username)?;
        Ok(Self { room_id, identity })
    }
}

/// Drives one client through entry, join and leave.
pub struct SessionController<C, E> {
    env: E,
    state: SessionState,
    /// Notices shown on the entry screen.
    entry_notices: PresenceTracker,
    room: Option<RoomState>,
    client: Option<SyncClient<C>>,
    subscription: Option<SubscriptionId>,
    viewport: Option<Viewport>,
    /// Whether finishing the current leave should route to the entry screen.
    navigate_on_close: bool,
}

impl<C: Channel, E: Environment> SessionController<C, E> {
    pub fn new(env: E) -> Self {
        Self {
            env,
            state: SessionState::Disconnected,
            entry_notices: PresenceTracker::for_board(NoticeBoard::Entry),
            room: None,
            client: None,
            subscription: None,
            viewport: None,
            navigate_on_close: false,
        }
    }

    // ── Entry screen ────────────────────────────────────────────

    /// Validate the entry form and, if valid, navigate to the room.
    ///
    /// A malformed room id posts an error notice. An empty username only
    /// blocks navigation.
    pub fn submit_entry(&mut self, room_id: &str, username: &str) -> Result<JoinRequest, ValidationError> {
        let request = match JoinRequest::parse(room_id, username) {
            Ok(request) => request,
            Err(e) => {
                if let ValidationError::InvalidRoomId(_) = e {
                    self.entry_notices.post(NoticeKind::Error, "Incorrect room ID");
                }
                log::warn!("Entry rejected: {e}");
                return Err(e);
            }
        };

        self.env.navigate(Route::Room {
            room_id: request.room_id,
            identity: request.identity.clone(),
        });
        Ok(request)
    }

    /// Mint a new room id for the entry form.
    pub fn create_room(&mut self) -> RoomId {
        let room_id = RoomId::generate();
        self.entry_notices.post(NoticeKind::Success, "Room created");
        log::info!("Created room {room_id}");
        room_id
    }

    // ── Room lifecycle ──────────────────────────────────────────

    /// Enter a room over an already-open channel.
    pub fn join(&mut self, request: JoinRequest, channel: C) -> Result<(), SessionError> {
        self.expect(&[SessionState::Disconnected], "join")?;

        let mut client = SyncClient::new(request.room_id, channel);
        self.subscription = Some(self.env.subscribe(&[EnvTopic::Resize, EnvTopic::Navigation]));
        client.join(&request.identity);

        log::info!("Joining room {} as {}", request.room_id, request.identity);
        self.room = Some(RoomState::new(request.identity));
        self.client = Some(client);
        self.state = SessionState::Joining;
        Ok(())
    }

    /// Feed one hub message into the session.
    pub fn handle_inbound(&mut self, msg: ServerMessage) -> Option<Applied> {
        let (Some(client), Some(room)) = (self.client.as_ref(), self.room.as_mut()) else {
            log::debug!("Dropping inbound message with no open room");
            return None;
        };
        if !matches!(self.state, SessionState::Joining | SessionState::Joined) {
            log::debug!("Dropping inbound message while {:?}", self.state);
            return None;
        }

        let applied = client.apply(room, msg);

        if self.state == SessionState::Joining && room.includes_self() {
            log::info!("Joined room {}", client.room_id());
            self.state = SessionState::Joined;
        }
        Some(applied)
    }

    pub fn edit_document(&mut self, content: impl Into<String>) -> Result<(), SessionError> {
        let (client, room) = self.active("edit the document")?;
        client.update_document(room, content);
        Ok(())
    }

    pub fn change_language(&mut self, language: Language) -> Result<(), SessionError> {
        let (client, room) = self.active("change the language")?;
        client.update_language(room, language);
        Ok(())
    }

    /// Change the local keybinding. Nothing is sent to the hub.
    pub fn set_keybinding(&mut self, keybinding: Keybinding) -> Result<(), SessionError> {
        let (_, room) = self.active("change the keybinding")?;
        room.set_keybinding(keybinding);
        Ok(())
    }

    /// Copy the room id to the clipboard and report the outcome as a notice.
    pub fn copy_room_id(&mut self) -> Result<(), SessionError> {
        let room_id = match &self.client {
            Some(client) if self.room.is_some() => client.room_id(),
            _ => return Err(self.invalid("copy the room id")),
        };
        let result = self.env.write_clipboard(&room_id.to_string());
        let Some(room) = self.room.as_mut() else {
            return Err(self.invalid("copy the room id"));
        };

        match result {
            Ok(()) => {
                room.post_notice(NoticeKind::Success, "Room ID copied");
            }
            Err(e) => {
                log::error!("{e}");
                room.post_notice(NoticeKind::Error, "Failed to copy room ID");
            }
        }
        Ok(())
    }

    /// Dismiss a notice from the room board or the entry board.
    pub fn dismiss_notice(&mut self, id: NoticeId) -> bool {
        match id.board() {
            NoticeBoard::Entry => self.entry_notices.dismiss(id),
            NoticeBoard::Room => self.room.as_mut().is_some_and(|room| room.dismiss_notice(id)),
        }
    }

    /// Explicit leave. Routes back to the entry screen once the channel
    /// reports it is no longer connected.
    pub fn leave(&mut self) -> Result<(), SessionError> {
        self.expect(&[SessionState::Joining, SessionState::Joined], "leave")?;
        self.begin_leave(true);
        self.finish_leave();
        Ok(())
    }

    /// Re-check a pending leave. Returns `true` once disconnected.
    pub fn poll_leave(&mut self) -> bool {
        if self.state == SessionState::Leaving {
            self.finish_leave();
        }
        self.state == SessionState::Disconnected
    }

    /// Handle a notification from a subscribed topic.
    pub fn on_environment(&mut self, event: EnvEvent) {
        match event {
            EnvEvent::Resized(viewport) => {
                log::trace!("Viewport resized to {}x{}", viewport.width, viewport.height);
                self.viewport = Some(viewport);
            }
            EnvEvent::Navigated(entry) => {
                let in_room = matches!(self.state, SessionState::Joining | SessionState::Joined);
                if in_room && entry.identity.is_none() {
                    log::info!("History entry without identity, leaving room");
                    // The history already moved; no extra navigation.
                    self.begin_leave(false);
                    self.finish_leave();
                }
            }
        }
    }

    /// The inbound stream ended on its own. Terminal.
    pub fn channel_lost(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        log::warn!("Channel lost while {:?}", self.state);
        if let Some(id) = self.subscription.take() {
            self.env.unsubscribe(id);
        }
        self.client = None;
        self.room = None;
        self.state = SessionState::Disconnected;
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn room(&self) -> Option<&RoomState> {
        self.room.as_ref()
    }

    pub fn client(&self) -> Option<&SyncClient<C>> {
        self.client.as_ref()
    }

    pub fn entry_notices(&self) -> &PresenceTracker {
        &self.entry_notices
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    // ── Internals ───────────────────────────────────────────────

    fn begin_leave(&mut self, navigate: bool) {
        if let Some(client) = self.client.as_mut() {
            client.leave();
        }
        if let Some(id) = self.subscription.take() {
            self.env.unsubscribe(id);
        }
        self.navigate_on_close = navigate;
        self.state = SessionState::Leaving;
    }

    fn finish_leave(&mut self) {
        let still_connected = self.client.as_ref().is_some_and(|c| c.is_connected());
        if still_connected {
            log::warn!("Channel still reports connected after close; staying in Leaving");
            return;
        }

        self.client = None;
        self.room = None;
        self.state = SessionState::Disconnected;
        log::info!("Left room");

        if std::mem::take(&mut self.navigate_on_close) {
            self.env.navigate(Route::Entry);
        }
    }

    fn active(&mut self, action: &'static str) -> Result<(&mut SyncClient<C>, &mut RoomState), SessionError> {
        let state = self.state;
        match (self.client.as_mut(), self.room.as_mut()) {
            (Some(client), Some(room)) if matches!(state, SessionState::Joining | SessionState::Joined) => {
                Ok((client, room))
            }
            _ => Err(SessionError::InvalidState { action, state }),
        }
    }

    fn expect(&self, allowed: &[SessionState], action: &'static str) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidState { action, state: self.state }
    }
}
