use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, server::Server};

/// NOTICE, RFC 2812 3.3.2. Delivery matches PRIVMSG, but a notice never
/// elicits an automatic reply of any kind, errors included; anything that
/// cannot be delivered is dropped on the floor.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    if !client.is_registered() {
        return Ok(());
    }
    if message.params.len() != 1 {
        return Ok(());
    }
    let text = match &message.trailing {
        Some(text) if !text.is_empty() => text,
        _ => return Ok(()),
    };

    let target = &message.params[0];
    if let Some(channel) = server.directory().channel(target) {
        channel.notice(server, client, text);
    } else if let Some(peer) = server.directory().client_by_nick(target) {
        peer.send_message(
            &Message::with_prefix(client.prefix(), "NOTICE")
                .param(peer.display_nick())
                .trailing(text.as_str()),
        );
    }
    Ok(())
}
