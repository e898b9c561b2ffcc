//! Local room state: the single source of truth for rendering.
//!
//! Every mutation goes through a named reducer. Reducers are idempotent and
//! report whether anything changed, so the renderer can skip redundant
//! repaints and tests can check convergence without a UI.

use std::fmt;
use std::str::FromStr;

use crate::identity::{Color, Identity};
use crate::presence::{NoticeId, NoticeKind, PresenceTracker};
use crate::protocol::Language;

/// Shared document: content plus its language mode. Last writer wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub language: Language,
}

/// One entry of the membership list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub identity: Identity,
    pub color: Color,
}

impl Member {
    pub fn new(identity: Identity) -> Self {
        let color = identity.color();
        Self { identity, color }
    }

    pub fn initials(&self) -> String {
        self.identity.initials()
    }
}

/// Editor input emulation. Purely local; never sent to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Keybinding {
    #[default]
    Default,
    Emacs,
    Vim,
}

impl Keybinding {
    pub const ALL: [Keybinding; 3] = [Keybinding::Default, Keybinding::Emacs, Keybinding::Vim];

    pub fn as_str(&self) -> &'static str {
        match self {
            Keybinding::Default => "default",
            Keybinding::Emacs => "emacs",
            Keybinding::Vim => "vim",
        }
    }

    /// Keyboard handler name for the editor, `None` for plain input.
    pub fn handler(&self) -> Option<&'static str> {
        match self {
            Keybinding::Default => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for Keybinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Keybinding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Keybinding::ALL
            .into_iter()
            .find(|kb| kb.as_str() == s)
            .ok_or_else(|| format!("unknown keybinding: {s}"))
    }
}

/// Client-side cache of one room.
#[derive(Debug)]
pub struct RoomState {
    own_identity: Identity,
    document: Document,
    members: Vec<Member>,
    presence: PresenceTracker,
    keybinding: Keybinding,
}

impl RoomState {
    pub fn new(own_identity: Identity) -> Self {
        Self {
            own_identity,
            document: Document::default(),
            members: Vec::new(),
            presence: PresenceTracker::new(),
            keybinding: Keybinding::default(),
        }
    }

    // ── Reducers ────────────────────────────────────────────────

    /// Replace the document content.
    pub fn apply_document(&mut self, content: String) -> bool {
        if self.document.content == content {
            return false;
        }
        self.document.content = content;
        true
    }

    /// Replace the document language.
    pub fn apply_language(&mut self, language: Language) -> bool {
        if self.document.language == language {
            return false;
        }
        self.document.language = language;
        true
    }

    /// Replace the membership list wholesale, keeping the hub's order.
    pub fn apply_membership(&mut self, members: Vec<Identity>) -> bool {
        let unchanged = self.members.len() == members.len()
            && self.members.iter().zip(&members).all(|(m, id)| &m.identity == id);
        if unchanged {
            return false;
        }
        self.members = members.into_iter().map(Member::new).collect();
        true
    }

    pub fn note_joined(&mut self, identity: &Identity) -> NoticeId {
        self.presence.note_joined(identity)
    }

    pub fn note_left(&mut self, identity: &Identity) -> NoticeId {
        self.presence.note_left(identity)
    }

    /// Post a non-presence notice (clipboard results and the like).
    pub fn post_notice(&mut self, kind: NoticeKind, text: impl Into<String>) -> NoticeId {
        self.presence.post(kind, text)
    }

    pub fn dismiss_notice(&mut self, id: NoticeId) -> bool {
        self.presence.dismiss(id)
    }

    pub fn set_keybinding(&mut self, keybinding: Keybinding) -> bool {
        if self.keybinding == keybinding {
            return false;
        }
        self.keybinding = keybinding;
        true
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn own_identity(&self) -> &Identity {
        &self.own_identity
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn content(&self) -> &str {
        &self.document.content
    }

    pub fn language(&self) -> Language {
        self.document.language
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn is_member(&self, identity: &Identity) -> bool {
        self.members.iter().any(|m| &m.identity == identity)
    }

    /// Whether the latest membership snapshot lists this client.
    pub fn includes_self(&self) -> bool {
        self.is_member(&self.own_identity)
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn keybinding(&self) -> Keybinding {
        self.keybinding
    }
}
