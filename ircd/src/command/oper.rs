use std::sync::Arc;

use irc_codec::Message;

use crate::{client::Client, errors::HandleResult, numeric_error, server::Server};

/// OPER, RFC 2812 3.1.4. Credentials go to the configured authentication
/// backend; success grants the global `o` user mode and announces it.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    let username = &message.params[0];
    let password = &message.params[1];
    if !server.oper_auth().authenticate(username, password) {
        return numeric_error!(PasswdMismatch);
    }
    client.make_oper(server);
    Ok(())
}
