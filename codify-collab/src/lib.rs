//! # codify-collab: Room synchronization core for Codify
//!
//! Keeps every participant's view of a shared code room (document content,
//! language mode, member list) converged through an external relay hub, and
//! turns presence events into join/leave notices.
//!
//! ## Architecture
//!
//! ```text
//!  user edit ──► SessionController ──► SyncClient ──► Channel ──► Relay Hub
//!                       │                  │                          │
//!                       │                  ▼                          │
//!                       │              RoomState ◄── apply ◄──────────┘
//!                       │          (document, members,        broadcasts to
//!                       │           presence, keybinding)     every member
//!                       ▼
//!                 Environment (navigation, clipboard, resize/history events)
//! ```
//!
//! Text edits are last-writer-wins at document granularity; there is no
//! operational transform or CRDT merge.
//!
//! ## Modules
//!
//! - [`identity`]: usernames and their deterministic avatar colors
//! - [`protocol`]: JSON wire messages, room ids, languages
//! - [`store`]: `RoomState` and its reducers
//! - [`presence`]: join/leave notices with per-identity leave coalescing
//! - [`sync`]: two-phase update client over an abstract `Channel`
//! - [`session`]: lifecycle state machine and `Environment` seam
//! - [`transport`]: WebSocket `Channel`
//! - [`config`]: client configuration

pub mod identity;
pub mod protocol;
pub mod store;
pub mod presence;
pub mod sync;
pub mod session;
pub mod transport;
pub mod config;

// Re-exports for convenience
pub use identity::{color_of, Color, Identity};
pub use protocol::{
    ClientMessage, Language, ProtocolError, RoomId, ServerMessage, ValidationError,
};
pub use store::{Document, Keybinding, Member, RoomState};
pub use presence::{Notice, NoticeBoard, NoticeId, NoticeKind, PresenceTracker};
pub use sync::{Applied, Channel, SyncClient};
pub use session::{
    EnvEvent, EnvTopic, Environment, EnvironmentError, HistoryEntry, JoinRequest, Route,
    SessionController, SessionError, SessionState, SubscriptionId, Viewport,
};
pub use transport::WsChannel;
pub use config::ClientConfig;
