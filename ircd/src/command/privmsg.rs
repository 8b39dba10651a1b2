use std::sync::Arc;

use irc_codec::Message;

use crate::{
    client::Client, errors::HandleResult, make_numeric, modes::UserModeFlag, numeric_error,
    server::Server,
};

/// PRIVMSG, RFC 2812 3.3.1. One target, channel or nickname; delivering to
/// an away user additionally answers the sender with RPL_AWAY.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    if message.params.is_empty() {
        return numeric_error!(NoRecipient, "PRIVMSG");
    }
    if message.params.len() > 1 {
        return numeric_error!(TooManyTargets, &message.params[0]);
    }
    let text = match &message.trailing {
        Some(text) if !text.is_empty() => text,
        _ => return numeric_error!(NoTextToSend),
    };

    let target = &message.params[0];
    if let Some(channel) = server.directory().channel(target) {
        channel.message(server, client, text);
        return Ok(());
    }

    if let Some(peer) = server.directory().client_by_nick(target) {
        peer.send_message(
            &Message::with_prefix(client.prefix(), "PRIVMSG")
                .param(peer.display_nick())
                .trailing(text.as_str()),
        );
        if peer.has_mode(UserModeFlag::Away) {
            let away = peer.away_message().unwrap_or_default();
            client.send_numeric(server, make_numeric!(Away, &peer.display_nick(), &away));
        }
        return Ok(());
    }

    numeric_error!(NoSuchNick, target)
}
