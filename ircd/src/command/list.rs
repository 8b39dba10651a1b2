use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, make_numeric, server::Server};

/// LIST, RFC 2812 3.2.6. Secret channels are omitted for outsiders and
/// private ones listed without their topic; RPL_LISTSTART is long
/// deprecated and not sent.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    match message.params.first().filter(|p| !p.is_empty()) {
        None => {
            for channel in server.directory().channels() {
                if let Some(numeric) = channel.list_numeric(client) {
                    client.send_numeric(server, numeric);
                }
            }
        }
        Some(list) => {
            for name in list.split(',') {
                if let Some(channel) = server.directory().channel(name) {
                    if let Some(numeric) = channel.list_numeric(client) {
                        client.send_numeric(server, numeric);
                    }
                }
            }
        }
    }
    client.send_numeric(server, make_numeric!(ListEnd));
    Ok(())
}
