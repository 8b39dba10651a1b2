use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, numeric_error, server::Server};

/// NICK, RFC 2812 3.1.2. The nickname is reserved in the Directory as soon
/// as it is accepted, so two unregistered clients cannot both hold it; the
/// loser of a race sees ERR_NICKNAMEINUSE.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    let requested = message
        .params
        .first()
        .or(message.trailing.as_ref())
        .cloned();
    let Some(new_nick) = requested.filter(|n| !n.is_empty()) else {
        return numeric_error!(NoNicknameGiven);
    };

    if !client.state().authorized {
        return numeric_error!(PasswdMismatch);
    }

    let (has_nick, has_user) = {
        let state = client.state();
        (state.nick.is_some(), state.username.is_some())
    };

    if !has_nick {
        if server.directory().add_nick(&new_nick, client).is_err() {
            return numeric_error!(NicknameInUse, &new_nick);
        }
        client.state_mut().nick = Some(new_nick);
        if has_user {
            client.welcome(server);
        }
    } else if client.is_registered() {
        client.change_nick(server, &new_nick)?;
    } else {
        // renaming before registration completes: no announcement owed
        let Some(old_nick) = client.nick() else {
            return Ok(());
        };
        if server
            .directory()
            .update_nick(&old_nick, &new_nick, client)
            .is_err()
        {
            return numeric_error!(NicknameInUse, &new_nick);
        }
        client.state_mut().nick = Some(new_nick);
    }
    Ok(())
}
