use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, server::Server};

/// QUIT, RFC 2812 3.1.7. The reason defaults to the nickname; teardown
/// announces the QUIT in every joined channel and answers `ERROR :quit`.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    let reason = message
        .trailing
        .clone()
        .or_else(|| message.params.first().cloned())
        .unwrap_or_else(|| client.display_nick());
    client.teardown(server, &reason);
    Ok(())
}
