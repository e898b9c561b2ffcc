//! Terminal client for a Codify room.
//!
//! ```text
//! codify <ROOM_ID | --new> <USERNAME>
//! ```
//!
//! Every plain input line is appended to the shared document. Commands:
//! `:lang <name>`, `:keys <name>`, `:copy`, `:who`, `:show`, `:clear`,
//! `:leave`. End of input leaves the room.
//!
//! The hub URL comes from `CODIFY_HUB_URL` (default `ws://127.0.0.1:9090`).

use std::collections::{HashMap, HashSet};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use codify_collab::{
    ClientConfig, EnvTopic, Environment, EnvironmentError, Keybinding, Language, Notice,
    NoticeId, NoticeKind, PresenceTracker, Route, SessionController, SessionState,
    SubscriptionId, WsChannel,
};
use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Environment backed by stdout. The terminal has no history or resize
/// events, so subscriptions are only recorded.
#[derive(Default)]
struct TerminalEnv {
    next_sub: u64,
    subscriptions: HashSet<u64>,
}

impl Environment for TerminalEnv {
    fn subscribe(&mut self, topics: &[EnvTopic]) -> SubscriptionId {
        let id = self.next_sub;
        self.next_sub += 1;
        self.subscriptions.insert(id);
        log::debug!("Subscribed to {topics:?}");
        SubscriptionId(id)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscriptions.remove(&id.0);
    }

    fn navigate(&mut self, route: Route) {
        match route {
            Route::Entry => println!("── left the room ──"),
            Route::Room { room_id, identity } => println!("── entering {room_id} as {identity} ──"),
        }
    }

    fn write_clipboard(&mut self, text: &str) -> Result<(), EnvironmentError> {
        println!("Room ID: {text}");
        Ok(())
    }
}

type Controller = SessionController<WsChannel, TerminalEnv>;

/// How long a printed notice stays active, like a toast on screen. A
/// repeated leave within this window updates the same notice.
const NOTICE_TTL: Duration = Duration::from_secs(4);

/// Notices already printed, with the time they were shown.
#[derive(Default)]
struct NoticeLog {
    shown: HashMap<NoticeId, Instant>,
}

impl NoticeLog {
    /// Notices not printed yet. Marks them shown at `now`.
    fn unseen<'a>(&mut self, notices: &'a [Notice], now: Instant) -> Vec<&'a Notice> {
        let mut fresh = Vec::new();
        for notice in notices {
            if !self.shown.contains_key(&notice.id) {
                self.shown.insert(notice.id, now);
                fresh.push(notice);
            }
        }
        fresh
    }

    /// Notices shown for at least [`NOTICE_TTL`]. They are forgotten here
    /// and should be dismissed.
    fn expired(&mut self, now: Instant) -> Vec<NoticeId> {
        let ids: Vec<NoticeId> = self
            .shown
            .iter()
            .filter(|(_, at)| now.duration_since(**at) >= NOTICE_TTL)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.shown.remove(id);
        }
        ids
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [room_arg, username] = args.as_slice() else {
        eprintln!("usage: codify <ROOM_ID | --new> <USERNAME>");
        return ExitCode::from(2);
    };

    let config = ClientConfig::from_env();
    let mut controller = Controller::new(TerminalEnv::default());

    let room_input = if room_arg == "--new" {
        controller.create_room().to_string()
    } else {
        room_arg.clone()
    };
    let mut notices = NoticeLog::default();
    let entry = controller.submit_entry(&room_input, username);
    print_notices(&controller, &mut notices);
    let request = match entry {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (channel, mut inbound) = match WsChannel::connect(&config.hub_url, config.inbound_capacity).await {
        Ok(pair) => pair,
        Err(e) => {
            error!("Could not reach hub at {}: {e}", config.hub_url);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = controller.join(request, channel) {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            msg = inbound.recv() => match msg {
                Some(msg) => {
                    expire_notices(&mut controller, &mut notices);
                    let was_joining = controller.state() == SessionState::Joining;
                    if let Some(applied) = controller.handle_inbound(msg) {
                        if applied.changed() || was_joining {
                            render(&controller);
                        }
                    }
                    print_notices(&controller, &mut notices);
                }
                None => {
                    controller.channel_lost();
                    eprintln!("Connection to the hub was lost.");
                    return ExitCode::FAILURE;
                }
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    expire_notices(&mut controller, &mut notices);
                    if !run_command(&mut controller, &line) {
                        break;
                    }
                    print_notices(&controller, &mut notices);
                }
                Ok(None) => {
                    leave(&mut controller);
                    break;
                }
                Err(e) => {
                    error!("Failed to read input: {e}");
                    leave(&mut controller);
                    break;
                }
            },
        }
    }

    // Let the writer task push the close frame out.
    tokio::task::yield_now().await;
    if !controller.poll_leave() {
        info!("Exiting before the hub acknowledged the close");
    }
    ExitCode::SUCCESS
}

/// Handle one input line. Returns `false` when the session is over.
fn run_command(controller: &mut Controller, line: &str) -> bool {
    let (cmd, arg) = match line.split_once(' ') {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    };

    let result = match cmd {
        ":leave" => {
            leave(controller);
            return false;
        }
        ":lang" => match arg.parse::<Language>() {
            Ok(language) => controller.change_language(language),
            Err(e) => {
                let names: Vec<&str> = Language::ALL.iter().map(Language::as_str).collect();
                println!("{e} (one of: {})", names.join(", "));
                Ok(())
            }
        },
        ":keys" => match arg.parse::<Keybinding>() {
            Ok(keybinding) => controller.set_keybinding(keybinding),
            Err(e) => {
                println!("{e}");
                Ok(())
            }
        },
        ":copy" => controller.copy_room_id(),
        ":who" => {
            print_members(controller);
            Ok(())
        }
        ":show" => {
            render(controller);
            Ok(())
        }
        ":clear" => controller.edit_document(String::new()),
        _ => {
            let mut content = controller.room().map(|r| r.content().to_string()).unwrap_or_default();
            content.push_str(line);
            content.push('\n');
            controller.edit_document(content)
        }
    };

    if let Err(e) = result {
        println!("{e}");
    }
    controller.state() != SessionState::Disconnected
}

fn render(controller: &Controller) {
    let Some(room) = controller.room() else {
        return;
    };
    let keys = room.keybinding().handler().unwrap_or("default");
    println!("┌─ {} · keys: {keys}", room.language());
    for line in room.content().lines() {
        println!("│ {line}");
    }
    println!("└─");
}

fn print_members(controller: &Controller) {
    let Some(room) = controller.room() else {
        return;
    };
    for member in room.members() {
        let marker = if &member.identity == room.own_identity() { " (you)" } else { "" };
        println!("  [{}] {} {}{marker}", member.initials(), member.identity, member.color);
    }
}

fn leave(controller: &mut Controller) {
    if let Err(e) = controller.leave() {
        log::debug!("Leave skipped: {e}");
    }
}

/// Print every notice not shown yet. Printed notices stay active until
/// [`expire_notices`] dismisses them.
fn print_notices(controller: &Controller, shown: &mut NoticeLog) {
    let now = Instant::now();
    let boards: [Option<&PresenceTracker>; 2] = [
        Some(controller.entry_notices()),
        controller.room().map(|r| r.presence()),
    ];
    for board in boards.into_iter().flatten() {
        for notice in shown.unseen(board.active(), now) {
            let prefix = match notice.kind {
                NoticeKind::Info => "•",
                NoticeKind::Success => "✓",
                NoticeKind::Error => "✗",
            };
            println!("{prefix} {}", notice.text);
        }
    }
}

/// Dismiss notices that have been on screen for [`NOTICE_TTL`].
fn expire_notices(controller: &mut Controller, shown: &mut NoticeLog) {
    for id in shown.expired(Instant::now()) {
        controller.dismiss_notice(id);
    }
}
