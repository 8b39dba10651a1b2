use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, numeric_error, server::Server};

/// PASS, RFC 2812 3.1.1. Only meaningful before NICK/USER; the outcome is
/// remembered and enforced when NICK is attempted.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    {
        let state = client.state();
        if state.nick.is_some() || state.username.is_some() {
            return numeric_error!(AlreadyRegistered);
        }
    }
    client.state_mut().authorized = message.params[0] == server.config().password;
    Ok(())
}
