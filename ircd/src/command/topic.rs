use std::sync::Arc;

use irc_codec::Message;

use crate::{
    client::Client, errors::HandleResult, modes::ChannelModeFlag, numeric_error, server::Server,
};

/// TOPIC, RFC 2812 3.2.4. Empty topic text is a query. A secret channel
/// answers outsiders as if it did not exist.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    let name = &message.params[0];
    let Some(channel) = server.directory().channel(name) else {
        return numeric_error!(NoSuchChannel, name);
    };

    let folded = client.folded_nick().unwrap_or_default();
    if channel.has_flag(ChannelModeFlag::Secret) && !channel.is_member(&folded) {
        return numeric_error!(NoSuchChannel, name);
    }

    let topic = message
        .params
        .get(1)
        .map(String::as_str)
        .or(message.trailing.as_deref())
        .unwrap_or("");
    channel.topic_command(server, client, topic)
}
