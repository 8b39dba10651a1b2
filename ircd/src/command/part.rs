use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, make_numeric, server::Server};

/// PART, RFC 2812 3.2.2. Accepts a comma-separated channel list; errors are
/// reported per channel without aborting the rest of the list.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    let reason = message.trailing.as_deref().unwrap_or("");
    for name in message.params[0].split(',') {
        match server.directory().channel(name) {
            Some(channel) => {
                if let Err(e) = channel.part(server, client, reason) {
                    super::send_command_error(server, client, e);
                }
            }
            None => client.send_numeric(server, make_numeric!(NoSuchChannel, name)),
        }
    }
    Ok(())
}
