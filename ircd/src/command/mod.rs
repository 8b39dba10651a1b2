//! Command dispatch.
//!
//! A verb maps to a handler function plus the cheap preconditions the
//! dispatcher enforces for it: minimum parameter count and whether the
//! client must be registered. Handlers run synchronously on the client's
//! reader task and report refusals as numeric errors.

use std::{collections::HashMap, sync::Arc};

use irc_codec::Message;

use crate::{
    client::Client,
    errors::{CommandError, HandleResult},
    make_numeric,
    server::Server,
};

mod away;
mod join;
mod kick;
mod list;
mod mode;
mod motd;
mod names;
mod nick;
mod notice;
mod oper;
mod part;
mod pass;
mod ping;
mod privmsg;
mod quit;
mod topic;
mod user;
mod who;

type HandlerFn = fn(&Arc<Server>, &Arc<Client>, &Message) -> HandleResult;

struct CommandEntry {
    handler: HandlerFn,
    min_params: usize,
    needs_registration: bool,
}

/// The dispatch table from upper-cased verb to handler.
pub struct CommandMux {
    commands: HashMap<String, CommandEntry>,
}

impl CommandMux {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    fn handle(&mut self, verb: &str, handler: HandlerFn, min_params: usize, needs_registration: bool) {
        self.commands.insert(
            verb.to_string(),
            CommandEntry {
                handler,
                min_params,
                needs_registration,
            },
        );
    }

    /// The full verb set this server speaks.
    pub fn with_defaults() -> Self {
        let mut mux = Self::new();
        mux.handle("PASS", pass::handle, 1, false);
        mux.handle("NICK", nick::handle, 0, false);
        mux.handle("USER", user::handle, 0, false);
        mux.handle("QUIT", quit::handle, 0, false);
        mux.handle("JOIN", join::handle, 1, true);
        mux.handle("PART", part::handle, 1, true);
        mux.handle("PRIVMSG", privmsg::handle, 0, true);
        // NOTICE performs its own checks; it must never answer with an error
        mux.handle("NOTICE", notice::handle, 0, false);
        mux.handle("MODE", mode::handle, 1, false);
        mux.handle("TOPIC", topic::handle, 1, true);
        mux.handle("AWAY", away::handle, 0, true);
        mux.handle("WHO", who::handle, 0, true);
        mux.handle("NAMES", names::handle, 0, true);
        mux.handle("LIST", list::handle, 0, true);
        mux.handle("KICK", kick::handle, 2, true);
        mux.handle("MOTD", motd::handle, 0, false);
        mux.handle("PING", ping::handle_ping, 0, false);
        mux.handle("PONG", ping::handle_pong, 0, false);
        mux.handle("OPER", oper::handle, 2, true);
        mux
    }

    /// Routes one message. Unknown verbs, missing parameters and
    /// unregistered access are answered here; everything else is the
    /// handler's business.
    pub fn dispatch(&self, server: &Arc<Server>, client: &Arc<Client>, message: &Message) {
        let verb = message.command.to_ascii_uppercase();
        let Some(entry) = self.commands.get(&verb) else {
            client.send_numeric(server, make_numeric!(UnknownCommand, &verb));
            return;
        };
        if entry.needs_registration && !client.is_registered() {
            client.send_numeric(server, make_numeric!(NotRegistered));
            return;
        }
        if message.params.len() < entry.min_params {
            client.send_numeric(server, make_numeric!(NeedMoreParams, &verb));
            return;
        }
        if let Err(e) = (entry.handler)(server, client, message) {
            send_command_error(server, client, e);
        }
    }
}

impl Default for CommandMux {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Delivers a handler refusal to the issuing client. Used by the dispatcher
/// and by handlers that iterate over several targets without aborting.
pub(crate) fn send_command_error(server: &Server, client: &Client, error: CommandError) {
    if let CommandError::Numeric(numeric) = error {
        client.send_numeric(server, numeric);
    }
}
