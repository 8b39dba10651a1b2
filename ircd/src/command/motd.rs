use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, server::Server};

/// MOTD, RFC 2812 3.4.1: re-issues the MOTD block on demand.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, _message: &Message) -> HandleResult {
    client.send_motd(server);
    Ok(())
}
