//! Shared fixtures for state-level tests: a server with no listener and
//! clients whose outbound queues are captured instead of written to a
//! socket.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    client::Client,
    config::ServerConfig,
    connection::{Connection, ConnectionControl},
    server::Server,
};

pub(crate) fn build_server() -> Arc<Server> {
    Arc::new(Server::new(ServerConfig::default()).expect("default config"))
}

/// Everything queued for one client, drained on demand.
pub(crate) struct Outbox(UnboundedReceiver<ConnectionControl>);

impl Outbox {
    pub fn lines(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(control) = self.0.try_recv() {
            if let ConnectionControl::Send(line) = control {
                out.push(line);
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.lines();
    }

    /// Whether any queued line contains the fragment.
    pub fn saw(&mut self, fragment: &str) -> bool {
        self.lines().iter().any(|line| line.contains(fragment))
    }
}

/// A fully registered client known to the server's Directory, with its
/// outbound queue captured.
pub(crate) fn registered_client(
    server: &Arc<Server>,
    nick: &str,
    port: u16,
) -> (Arc<Client>, Outbox) {
    let (conn, outbox) = Connection::test_channel();
    let client = Arc::new(Client::new(([127, 0, 0, 1], port).into(), conn, true));
    {
        let mut state = client.state_mut();
        state.nick = Some(nick.to_string());
        state.username = Some(nick.to_string());
        state.hostname = Some("host.example".to_string());
        state.realname = Some(format!("{} example", nick));
        state.registered = true;
    }
    server.directory().add_client(Arc::clone(&client));
    server
        .directory()
        .add_nick(nick, &client)
        .expect("nick free in test fixture");
    (client, Outbox(outbox))
}
