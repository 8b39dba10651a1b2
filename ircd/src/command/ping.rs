use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, server::Server};

/// PING, RFC 2812 3.7.2.
pub(super) fn handle_ping(
    server: &Arc<Server>,
    client: &Arc<Client>,
    _message: &Message,
) -> HandleResult {
    client.send_message(&Message::new("PONG").trailing(server.name()));
    Ok(())
}

/// PONG, RFC 2812 3.7.3. Receipt alone has already reset the idle timer.
pub(super) fn handle_pong(
    _server: &Arc<Server>,
    _client: &Arc<Client>,
    _message: &Message,
) -> HandleResult {
    Ok(())
}
