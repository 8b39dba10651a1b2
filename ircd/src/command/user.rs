use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, numeric_error, server::Server};

/// USER, RFC 2812 3.1.3: exactly three parameters plus the trailing real
/// name. Completes registration when a nickname is already held.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    if client.state().username.is_some() {
        return numeric_error!(AlreadyRegistered);
    }
    if message.params.len() != 3 {
        return numeric_error!(NeedMoreParams, "USER");
    }
    let Some(realname) = &message.trailing else {
        return numeric_error!(NeedMoreParams, "USER");
    };

    {
        let mut state = client.state_mut();
        state.username = Some(message.params[0].clone());
        state.hostname = Some(message.params[2].clone());
        state.realname = Some(realname.clone());
    }

    if client.nick().is_some() {
        client.welcome(server);
    }
    Ok(())
}
