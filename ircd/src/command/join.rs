use std::sync::Arc;

use irc_codec::Message;

use crate::{
    channel::{valid_channel_name, JoinOutcome},
    client::Client,
    errors::HandleResult,
    make_numeric,
    server::Server,
};

/// JOIN, RFC 2812 3.2.1. Takes a comma-separated channel list with keys
/// aligned positionally; the special list `0` parts everything instead.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    let channel_list = &message.params[0];
    if channel_list == "0" {
        for channel in client.channels() {
            if let Err(e) = channel.part(server, client, "") {
                super::send_command_error(server, client, e);
            }
        }
        return Ok(());
    }

    let keys: Vec<&str> = message
        .params
        .get(1)
        .map(|keys| keys.split(',').collect())
        .unwrap_or_default();

    for (i, name) in channel_list.split(',').enumerate() {
        if name.is_empty() {
            continue;
        }
        if !valid_channel_name(name) {
            client.send_numeric(server, make_numeric!(NoSuchChannel, name));
            continue;
        }
        let key = keys.get(i).copied().unwrap_or("");

        // a freshly reaped channel reports itself defunct; take a new one
        loop {
            let channel = server.directory().channel_or_create(name);
            if channel.join(server, client, key) != JoinOutcome::Defunct {
                break;
            }
        }
    }
    Ok(())
}
