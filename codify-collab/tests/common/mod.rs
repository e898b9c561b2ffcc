//! Test relay hubs.
//!
//! Both hubs share [`HubState`], a minimal reference for the hub side of the
//! protocol: it stores canonical per-room content and language, keeps the
//! membership list in join order, and fans broadcasts out to every member of
//! a room (the sender included).
//!
//! - [`MemoryHub`] is synchronous. Emitting on a [`MemoryChannel`] runs the
//!   hub immediately and queues replies until a test delivers them.
//! - [`start_relay_hub`] serves the same state over real WebSockets.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use codify_collab::{
    Channel, ClientMessage, EnvTopic, Environment, EnvironmentError, Identity, Language,
    ProtocolError, Route, RoomId, ServerMessage, SessionController, SubscriptionId,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;

pub const ROOM: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

pub type ConnId = u64;

pub fn id(name: &str) -> Identity {
    Identity::new(name).unwrap()
}

pub fn room_id() -> RoomId {
    RoomId::parse(ROOM).unwrap()
}

// ─── Hub state ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct HubRoom {
    content: String,
    language: Language,
    members: Vec<(ConnId, Identity)>,
}

impl HubRoom {
    fn identities(&self) -> Vec<Identity> {
        self.members.iter().map(|(_, identity)| identity.clone()).collect()
    }

    fn conns(&self) -> Vec<ConnId> {
        self.members.iter().map(|(conn, _)| *conn).collect()
    }
}

/// Snapshot of one room's canonical state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub content: String,
    pub language: Language,
    pub members: Vec<Identity>,
}

#[derive(Debug, Default)]
pub struct HubState {
    rooms: HashMap<RoomId, HubRoom>,
    conn_rooms: HashMap<ConnId, RoomId>,
    outboxes: HashMap<ConnId, mpsc::UnboundedSender<ServerMessage>>,
    next_conn: ConnId,
}

impl HubState {
    fn register(&mut self, outbox: mpsc::UnboundedSender<ServerMessage>) -> ConnId {
        let conn = self.next_conn;
        self.next_conn += 1;
        self.outboxes.insert(conn, outbox);
        conn
    }

    fn handle(&mut self, conn: ConnId, msg: ClientMessage) {
        match msg {
            ClientMessage::Join { room_id, identity } => {
                self.conn_rooms.insert(conn, room_id);
                let room = self.rooms.entry(room_id).or_default();
                room.members.push((conn, identity.clone()));
                let members = room.identities();
                for peer in room.conns() {
                    self.push(peer, ServerMessage::MembershipUpdated { members: members.clone() });
                    if peer != conn {
                        self.push(peer, ServerMessage::MemberJoined { identity: identity.clone() });
                    }
                }
            }
            ClientMessage::UpdateDocument { room_id, content } => {
                self.rooms.entry(room_id).or_default().content = content;
            }
            ClientMessage::RequestDocumentSync { room_id } => {
                let content = self.rooms.entry(room_id).or_default().content.clone();
                self.broadcast(room_id, ServerMessage::DocumentChanged { content });
            }
            ClientMessage::UpdateLanguage { room_id, language } => {
                self.rooms.entry(room_id).or_default().language = language;
            }
            ClientMessage::RequestLanguageSync { room_id } => {
                let language = self.rooms.entry(room_id).or_default().language;
                self.broadcast(room_id, ServerMessage::LanguageChanged { language });
            }
            ClientMessage::Leave => self.remove_member(conn),
        }
    }

    fn disconnect(&mut self, conn: ConnId) {
        self.remove_member(conn);
        self.outboxes.remove(&conn);
    }

    fn remove_member(&mut self, conn: ConnId) {
        let Some(room_id) = self.conn_rooms.remove(&conn) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };
        let Some(pos) = room.members.iter().position(|(c, _)| *c == conn) else {
            return;
        };
        let (_, identity) = room.members.remove(pos);
        let members = room.identities();
        self.broadcast(room_id, ServerMessage::MemberLeft { identity });
        self.broadcast(room_id, ServerMessage::MembershipUpdated { members });
    }

    fn broadcast(&mut self, room_id: RoomId, msg: ServerMessage) {
        let conns = self.rooms.get(&room_id).map(HubRoom::conns).unwrap_or_default();
        for conn in conns {
            self.push(conn, msg.clone());
        }
    }

    fn push(&self, conn: ConnId, msg: ServerMessage) {
        if let Some(outbox) = self.outboxes.get(&conn) {
            let _ = outbox.send(msg);
        }
    }

    fn snapshot(&self, room_id: RoomId) -> Option<RoomSnapshot> {
        self.rooms.get(&room_id).map(|room| RoomSnapshot {
            content: room.content.clone(),
            language: room.language,
            members: room.identities(),
        })
    }
}

// ─── In-memory hub ───────────────────────────────────────────────

pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
    inboxes: Mutex<HashMap<ConnId, mpsc::UnboundedReceiver<ServerMessage>>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            inboxes: Mutex::new(HashMap::new()),
        }
    }

    /// Open a new connection to the hub.
    pub fn connect(&self) -> MemoryChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = self.state.lock().unwrap().register(tx);
        self.inboxes.lock().unwrap().insert(conn, rx);
        MemoryChannel { conn, hub: self.state.clone(), connected: true }
    }

    /// Take every message queued for a connection.
    pub fn drain(&self, conn: ConnId) -> Vec<ServerMessage> {
        let mut inboxes = self.inboxes.lock().unwrap();
        let Some(rx) = inboxes.get_mut(&conn) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Queue a message for one connection, bypassing the hub logic.
    pub fn inject(&self, conn: ConnId, msg: ServerMessage) {
        self.state.lock().unwrap().push(conn, msg);
    }

    pub fn room(&self, room_id: RoomId) -> Option<RoomSnapshot> {
        self.state.lock().unwrap().snapshot(room_id)
    }

    /// Deliver everything queued for the controller's connection.
    /// Returns the number of messages delivered.
    pub fn deliver<E: Environment>(&self, ctl: &mut SessionController<MemoryChannel, E>) -> usize {
        let Some(conn) = ctl.client().map(|c| c.channel().conn()) else {
            return 0;
        };
        let msgs = self.drain(conn);
        let n = msgs.len();
        for msg in msgs {
            ctl.handle_inbound(msg);
        }
        n
    }
}

/// Client end of a [`MemoryHub`] connection.
pub struct MemoryChannel {
    conn: ConnId,
    hub: Arc<Mutex<HubState>>,
    connected: bool,
}

impl MemoryChannel {
    pub fn conn(&self) -> ConnId {
        self.conn
    }
}

impl Channel for MemoryChannel {
    fn emit(&mut self, msg: &ClientMessage) -> Result<(), ProtocolError> {
        if !self.connected {
            return Err(ProtocolError::ConnectionClosed);
        }
        self.hub.lock().unwrap().handle(self.conn, msg.clone());
        Ok(())
    }

    fn close(&mut self) {
        if std::mem::replace(&mut self.connected, false) {
            self.hub.lock().unwrap().remove_member(self.conn);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ─── WebSocket hub ───────────────────────────────────────────────

/// Start a WebSocket relay hub on a free port, return its URL.
pub async fn start_relay_hub() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(HubState::default()));

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_connection(stream, state.clone()));
        }
    });
    format!("ws://127.0.0.1:{port}")
}

async fn serve_connection(stream: TcpStream, state: Arc<Mutex<HubState>>) {
    let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = state.lock().unwrap().register(tx);

    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(msg) => {
                    let text = msg.encode().unwrap();
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(msg) = ClientMessage::decode(text.as_str()) {
                        state.lock().unwrap().handle(conn, msg);
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.lock().unwrap().disconnect(conn);
}

/// Feed hub messages into a controller until `done` holds.
pub async fn pump_until<C, E>(
    rx: &mut mpsc::Receiver<ServerMessage>,
    ctl: &mut SessionController<C, E>,
    done: impl Fn(&SessionController<C, E>) -> bool,
) where
    C: Channel,
    E: Environment,
{
    let result = timeout(Duration::from_secs(2), async {
        while !done(&*ctl) {
            let msg = rx.recv().await.expect("hub closed the stream");
            ctl.handle_inbound(msg);
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for hub messages");
}

// ─── Environment ─────────────────────────────────────────────────

/// Environment that records navigation and subscriptions.
#[derive(Debug, Default)]
pub struct TestEnv {
    pub routes: Vec<Route>,
    pub subscriptions: Vec<SubscriptionId>,
    pub clipboard: Option<String>,
    next_sub: u64,
}

impl Environment for TestEnv {
    fn subscribe(&mut self, _topics: &[EnvTopic]) -> SubscriptionId {
        let sub = SubscriptionId(self.next_sub);
        self.next_sub += 1;
        self.subscriptions.push(sub);
        sub
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscriptions.retain(|sub| *sub != id);
    }

    fn navigate(&mut self, route: Route) {
        self.routes.push(route);
    }

    fn write_clipboard(&mut self, text: &str) -> Result<(), EnvironmentError> {
        self.clipboard = Some(text.to_string());
        Ok(())
    }
}
