//! Per-connection client state and lifecycle.

use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use irc_codec::{CodecError, Message, Prefix};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::{select, sync::mpsc::UnboundedReceiver, sync::watch, time};
use tracing::{debug, info, warn};

use crate::{
    casemap::casefold,
    channel::Channel,
    connection::{Connection, ConnectionEvent},
    errors::HandleResult,
    make_numeric,
    modes::{UserModeFlag, UserModeSet},
    numeric::Numeric,
    numeric_error,
    server::Server,
};

/// Registration progress and identity, all behind one lock.
#[derive(Debug, Default)]
pub struct ClientState {
    pub nick: Option<String>,
    pub username: Option<String>,
    pub hostname: Option<String>,
    pub realname: Option<String>,
    pub away: Option<String>,
    pub authorized: bool,
    pub registered: bool,
}

/// One client connection. Created on accept, torn down exactly once when the
/// socket closes, the quit timer fires or the client QUITs.
pub struct Client {
    addr: SocketAddr,
    conn: Connection,
    state: RwLock<ClientState>,
    modes: RwLock<UserModeSet>,
    channels: RwLock<HashMap<String, Arc<Channel>>>,
    activity: watch::Sender<()>,
    dead: AtomicBool,
}

impl Client {
    pub fn new(addr: SocketAddr, conn: Connection, authorized: bool) -> Self {
        let (activity, _) = watch::channel(());
        let state = ClientState {
            authorized,
            ..Default::default()
        };
        Self {
            addr,
            conn,
            state: RwLock::new(state),
            modes: RwLock::new(UserModeSet::new()),
            channels: RwLock::new(HashMap::new()),
            activity,
            dead: AtomicBool::new(false),
        }
    }

    /// A client with no socket behind it, for state-level tests.
    #[cfg(test)]
    pub(crate) fn detached(addr: SocketAddr) -> Self {
        Self::new(addr, Connection::detached(), true)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) fn state(&self) -> RwLockReadGuard<ClientState> {
        self.state.read()
    }

    pub(crate) fn state_mut(&self) -> RwLockWriteGuard<ClientState> {
        self.state.write()
    }

    pub fn nick(&self) -> Option<String> {
        self.state.read().nick.clone()
    }

    /// The nickname for reply targeting; `*` before one is set.
    pub fn display_nick(&self) -> String {
        self.state
            .read()
            .nick
            .clone()
            .unwrap_or_else(|| "*".to_string())
    }

    pub fn folded_nick(&self) -> Option<String> {
        self.state.read().nick.as_deref().map(casefold)
    }

    /// `nick!user@host`, from the identity the client registered with.
    pub fn prefix(&self) -> Prefix {
        let state = self.state.read();
        Prefix::user(
            state.nick.as_deref().unwrap_or("*"),
            state.username.as_deref().unwrap_or("*"),
            state.hostname.as_deref().unwrap_or("*"),
        )
    }

    pub fn is_registered(&self) -> bool {
        self.state.read().registered
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    pub fn has_mode(&self, flag: UserModeFlag) -> bool {
        self.modes.read().is_set(flag)
    }

    pub fn add_mode(&self, flag: UserModeFlag) {
        self.modes.write().set(flag);
    }

    pub fn remove_mode(&self, flag: UserModeFlag) {
        self.modes.write().unset(flag);
    }

    pub fn modes_format(&self) -> String {
        self.modes.read().format()
    }

    pub fn away_message(&self) -> Option<String> {
        self.state.read().away.clone()
    }

    pub(crate) fn add_channel(&self, channel: &Arc<Channel>) {
        self.channels
            .write()
            .insert(channel.folded_name().to_string(), Arc::clone(channel));
    }

    pub(crate) fn remove_channel(&self, folded_name: &str) {
        self.channels.write().remove(folded_name);
    }

    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.channels.read().values().cloned().collect()
    }

    pub fn is_on(&self, folded_name: &str) -> bool {
        self.channels.read().contains_key(folded_name)
    }

    /// Queues one raw line for this client.
    pub fn send(&self, line: impl Into<String>) {
        self.conn.send(line);
    }

    pub fn send_message(&self, message: &Message) {
        self.send(message.to_string());
    }

    pub fn send_numeric(&self, server: &Server, numeric: Numeric) {
        self.send(numeric.format_for(server.name(), &self.display_nick()));
    }

    fn note_activity(&self) {
        let _ = self.activity.send(());
    }

    /// Registration is complete: emit the welcome block then the MOTD.
    pub fn welcome(&self, server: &Server) {
        self.state.write().registered = true;
        info!("Registered {} as {}", self.addr, self.display_nick());

        let prefix = self.prefix().to_string();
        self.send_numeric(server, make_numeric!(Welcome, &prefix));
        self.send_numeric(
            server,
            make_numeric!(YourHost, server.name(), server.version()),
        );
        self.send_numeric(server, make_numeric!(Created, &server.created()));
        self.send_numeric(
            server,
            make_numeric!(MyInfo, server.name(), server.version()),
        );
        self.send_motd(server);
    }

    pub fn send_motd(&self, server: &Server) {
        let motd = &server.config().motd;
        if motd.is_empty() {
            self.send_numeric(server, make_numeric!(NoMotd));
            return;
        }
        self.send_numeric(server, make_numeric!(MotdStart, server.name()));
        for line in motd.lines() {
            self.send_numeric(server, make_numeric!(Motd, line));
        }
        self.send_numeric(server, make_numeric!(EndOfMotd));
    }

    /// Changes nickname after registration: Directory first (atomically), then
    /// every joined channel's member key, then one NICK broadcast to the
    /// client itself and each distinct peer sharing a channel.
    pub fn change_nick(self: &Arc<Self>, server: &Server, new_nick: &str) -> HandleResult {
        let old_nick = self.state.read().nick.clone().unwrap_or_default();
        if server
            .directory()
            .update_nick(&old_nick, new_nick, self)
            .is_err()
        {
            return numeric_error!(NicknameInUse, new_nick);
        }

        // the announcement carries the old identity
        let line = Message::with_prefix(self.prefix(), "NICK")
            .trailing(new_nick)
            .to_string();

        self.state.write().nick = Some(new_nick.to_string());

        let old_folded = casefold(&old_nick);
        let new_folded = casefold(new_nick);

        let mut notified = HashSet::new();
        self.send(line.clone());
        notified.insert(new_folded.clone());

        for channel in self.channels() {
            channel.rename_member(&old_folded, &new_folded);
            for peer in channel.member_clients(server) {
                let Some(nick) = peer.folded_nick() else {
                    continue;
                };
                if notified.insert(nick) {
                    peer.send(line.clone());
                }
            }
        }
        Ok(())
    }

    /// Grants the global operator mode and announces it.
    pub fn make_oper(&self, server: &Server) {
        self.add_mode(UserModeFlag::Oper);
        let line = Message::with_prefix(server.prefix(), "MODE")
            .param(self.display_nick())
            .param("+o")
            .to_string();
        for peer in server.directory().nick_clients() {
            if peer.addr() != self.addr {
                peer.send(line.clone());
            }
        }
        self.send_numeric(server, make_numeric!(YoureOper));
    }

    /// The `<H|G>[*][@]` flag column of a WHO reply line.
    pub fn who_flags(&self, channel: Option<&Channel>) -> String {
        let mut flags = String::new();
        flags.push(if self.has_mode(UserModeFlag::Away) {
            'G'
        } else {
            'H'
        });
        if self.has_mode(UserModeFlag::Oper) || self.has_mode(UserModeFlag::LocalOper) {
            flags.push('*');
        }
        if let Some(channel) = channel {
            if let Some(folded) = self.folded_nick() {
                if channel.member_is_op(&folded) {
                    flags.push('@');
                }
            }
        }
        flags
    }

    /// Orderly exit, idempotent. Quits every joined channel, clears the
    /// Directory, tells the client goodbye and closes the socket.
    pub fn teardown(&self, server: &Server, reason: &str) {
        if self.dead.swap(true, Ordering::SeqCst) {
            return;
        }
        self.note_activity(); // release the supervisor

        let channels: Vec<_> = {
            let mut channels = self.channels.write();
            channels.drain().map(|(_, channel)| channel).collect()
        };
        for channel in channels {
            channel.quit(server, self, reason);
        }

        if let Some(nick) = self.nick() {
            server.directory().remove_nick(&nick);
        }
        server.directory().remove_client(self.addr);

        self.send(
            Message::with_prefix(server.prefix(), "ERROR")
                .trailing("quit")
                .to_string(),
        );
        self.conn.close();
    }

    /// The reader task: decodes and dispatches this connection's commands in
    /// order. Handlers run synchronously here and only ever block on state
    /// locks, never on other clients' sockets.
    pub async fn run(
        self: Arc<Self>,
        server: Arc<Server>,
        mut events: UnboundedReceiver<ConnectionEvent>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::Message(line) => {
                    self.note_activity();
                    match Message::parse(&line) {
                        Ok(message) => server.mux().dispatch(&server, &self, &message),
                        Err(CodecError::EmptyMessage) => continue,
                        Err(e) => {
                            warn!("Closing {}: invalid frame: {}", self.addr, e);
                            self.teardown(&server, "Disconnected");
                            break;
                        }
                    }
                }
                ConnectionEvent::Closed(e) => {
                    debug!("Connection {} closed: {}", self.addr, e);
                    self.teardown(&server, "Disconnected");
                    break;
                }
            }
        }
    }

    /// The idle supervisor task: any traffic resets the timer; when it fires
    /// a PING goes out, and continued silence through the quit interval
    /// disconnects the client. Unregistered clients get the short interval
    /// and no PING.
    pub async fn supervise(self: Arc<Self>, server: Arc<Server>) {
        let mut activity = self.activity.subscribe();
        loop {
            if self.is_dead() {
                return;
            }
            let idle = if self.is_registered() {
                server.config().registered_idle()
            } else {
                server.config().unregistered_idle()
            };
            select! {
                changed = activity.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    continue;
                }
                _ = time::sleep(idle) => {}
            }
            if self.is_dead() {
                return;
            }
            if !self.is_registered() {
                info!("Dropping idle unregistered connection {}", self.addr);
                self.teardown(&server, "Disconnected");
                return;
            }

            self.send_message(&Message::new("PING").trailing(server.name()));

            select! {
                changed = activity.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = time::sleep(server.config().quit_interval()) => {
                    info!("Ping timeout for {}", self.display_nick());
                    self.teardown(&server, "Disconnected");
                    return;
                }
            }
        }
    }
}
