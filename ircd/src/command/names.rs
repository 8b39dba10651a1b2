use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, server::Server};

/// NAMES, RFC 2812 3.2.5. No argument walks every channel; secrecy and
/// privacy filtering happens per channel.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    match message.params.first() {
        None => {
            for channel in server.directory().channels() {
                channel.names(server, client);
            }
        }
        Some(list) => {
            for name in list.split(',') {
                if let Some(channel) = server.directory().channel(name) {
                    channel.names(server, client);
                }
            }
        }
    }
    Ok(())
}
