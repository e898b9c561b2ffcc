//! Presence notices: transient "joined" / "left" messages.
//!
//! Notices are independent of the authoritative membership snapshot held in
//! [`RoomState`](crate::store::RoomState). The hub may report the same
//! departure twice (transport-level close followed by an explicit leave), so
//! "left" notices are coalesced per identity: while a leave notice for a
//! member is still on screen, another leave for that member updates it in
//! place instead of stacking a second one.
//!
//! ```text
//! member-joined(alice) ──► [alice joined]
//! member-left(bob)     ──► [alice joined] [bob left]
//! member-left(bob)     ──► [alice joined] [bob left]      (same notice)
//! dismiss(bob left)    ──► [alice joined]
//! member-left(bob)     ──► [alice joined] [bob left]      (fresh notice)
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::identity::Identity;

/// Which screen a notice board belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum NoticeBoard {
    Entry,
    #[default]
    Room,
}

/// Handle for one posted notice. Unique across boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoticeId {
    board: NoticeBoard,
    seq: u64,
}

impl NoticeId {
    /// Board that posted this notice.
    pub fn board(&self) -> NoticeBoard {
        self.board
    }
}

impl fmt::Display for NoticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.board {
            NoticeBoard::Entry => write!(f, "entry-notice-{}", self.seq),
            NoticeBoard::Room => write!(f, "notice-{}", self.seq),
        }
    }
}

/// Visual category of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// One transient notice waiting to be shown or dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: NoticeId,
    pub kind: NoticeKind,
    pub text: String,
}

/// Notice board with identity-keyed coalescing for departures.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    board: NoticeBoard,
    /// Active notices in posting order.
    notices: Vec<Notice>,
    /// Leave notice currently on screen for each departed identity.
    pending_leaves: HashMap<Identity, NoticeId>,
    next_id: u64,
}

impl PresenceTracker {
    /// Room board.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_board(board: NoticeBoard) -> Self {
        Self { board, ..Self::default() }
    }

    pub fn board(&self) -> NoticeBoard {
        self.board
    }

    /// Post a free-form notice. Never coalesced.
    pub fn post(&mut self, kind: NoticeKind, text: impl Into<String>) -> NoticeId {
        let id = NoticeId { board: self.board, seq: self.next_id };
        self.next_id += 1;
        self.notices.push(Notice { id, kind, text: text.into() });
        id
    }

    /// Record a `member-joined` event. Every join yields a new notice.
    pub fn note_joined(&mut self, identity: &Identity) -> NoticeId {
        log::debug!("Presence: {identity} joined");
        self.post(NoticeKind::Info, format!("{identity} joined"))
    }

    /// Record a `member-left` event.
    ///
    /// Returns the id of the notice now showing the departure, which is the
    /// existing one if a leave notice for `identity` is still active.
    pub fn note_left(&mut self, identity: &Identity) -> NoticeId {
        let text = format!("{identity} left");

        if let Some(&id) = self.pending_leaves.get(identity) {
            if let Some(notice) = self.notices.iter_mut().find(|n| n.id == id) {
                log::debug!("Presence: {identity} left again, coalescing into {id}");
                notice.text = text;
                return id;
            }
        }

        log::debug!("Presence: {identity} left");
        let id = self.post(NoticeKind::Info, text);
        self.pending_leaves.insert(identity.clone(), id);
        id
    }

    /// Remove a notice. Returns `false` if it was not active.
    pub fn dismiss(&mut self, id: NoticeId) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.pending_leaves.retain(|_, pending| *pending != id);
        self.notices.len() != before
    }

    /// Drop every notice.
    pub fn clear(&mut self) {
        self.notices.clear();
        self.pending_leaves.clear();
    }

    /// Active notices, oldest first.
    pub fn active(&self) -> &[Notice] {
        &self.notices
    }

    pub fn get(&self, id: NoticeId) -> Option<&Notice> {
        self.notices.iter().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}
