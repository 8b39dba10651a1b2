use std::sync::Arc;

use irc_codec::Message;

use crate::{
    client::Client, errors::HandleResult, make_numeric, modes::UserModeFlag, server::Server,
};

/// AWAY, RFC 2812 4.1. With text, marks the client away; without, clears
/// the state. This is the only way the `a` user mode moves.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    let text = message
        .trailing
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| message.params.join(" "));

    if text.is_empty() {
        client.state_mut().away = None;
        client.remove_mode(UserModeFlag::Away);
        client.send_numeric(server, make_numeric!(Unaway));
    } else {
        client.state_mut().away = Some(text);
        client.add_mode(UserModeFlag::Away);
        client.send_numeric(server, make_numeric!(NowAway));
    }
    Ok(())
}
