use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, make_numeric, numeric_error, server::Server};

/// KICK, RFC 2812 3.2.8. Either one channel with any number of targets, or
/// channels and targets paired positionally.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    let channels: Vec<&str> = message.params[0].split(',').collect();
    let nicks: Vec<&str> = message.params[1].split(',').collect();
    if channels.len() != 1 && channels.len() != nicks.len() {
        return numeric_error!(NeedMoreParams, "KICK");
    }

    let comment = message
        .trailing
        .clone()
        .filter(|c| !c.is_empty())
        .or_else(|| message.params.get(2).cloned())
        .unwrap_or_else(|| client.display_nick());

    if channels.len() == 1 {
        return match server.directory().channel(channels[0]) {
            Some(channel) => channel.kick(server, client, &nicks, &comment),
            None => numeric_error!(NoSuchChannel, channels[0]),
        };
    }

    for (name, nick) in channels.iter().zip(&nicks) {
        match server.directory().channel(name) {
            Some(channel) => {
                if let Err(e) = channel.kick(server, client, &[*nick], &comment) {
                    super::send_command_error(server, client, e);
                }
            }
            None => client.send_numeric(server, make_numeric!(NoSuchChannel, name)),
        }
    }
    Ok(())
}
