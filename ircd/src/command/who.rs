use std::{collections::HashSet, sync::Arc};

use irc_codec::Message;

use crate::{
    channel::Channel, client::Client, errors::HandleResult, make_numeric,
    modes::UserModeFlag, numeric::Numeric, server::Server,
};

/// WHO, RFC 2812 3.6.1. A channel argument lists its members (invisible
/// ones only to fellow members), a nickname argument lists that user, no
/// argument walks everything visible to the requester. Hop count is always
/// zero here.
pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    match message.params.first() {
        Some(target) => {
            if let Some(channel) = server.directory().channel(target) {
                let folded = client.folded_nick().unwrap_or_default();
                let is_member = channel.is_member(&folded);
                for peer in channel.member_clients(server) {
                    if peer.has_mode(UserModeFlag::Invisible) && !is_member {
                        continue;
                    }
                    client.send_numeric(server, who_line(server, &peer, Some(&channel)));
                }
            } else if let Some(peer) = server.directory().client_by_nick(target) {
                client.send_numeric(server, who_line(server, &peer, None));
            }
            client.send_numeric(server, make_numeric!(EndOfWho, target));
        }
        None => {
            let mut seen = HashSet::new();
            for peer in server.directory().nick_clients() {
                if peer.has_mode(UserModeFlag::Invisible) {
                    continue;
                }
                if seen.insert(peer.addr()) {
                    client.send_numeric(server, who_line(server, &peer, None));
                }
            }
            for channel in client.channels() {
                for peer in channel.member_clients(server) {
                    if seen.insert(peer.addr()) {
                        client.send_numeric(server, who_line(server, &peer, Some(&channel)));
                    }
                }
            }
            client.send_numeric(server, make_numeric!(EndOfWho, "*"));
        }
    }
    Ok(())
}

fn who_line(server: &Server, subject: &Client, channel: Option<&Channel>) -> Numeric {
    let (username, hostname, nick, realname) = {
        let state = subject.state();
        (
            state.username.clone().unwrap_or_else(|| "*".to_string()),
            state.hostname.clone().unwrap_or_else(|| "*".to_string()),
            state.nick.clone().unwrap_or_else(|| "*".to_string()),
            state.realname.clone().unwrap_or_default(),
        )
    };
    let flags = subject.who_flags(channel);
    make_numeric!(
        WhoReply,
        channel.map(Channel::name).unwrap_or("*"),
        &username,
        &hostname,
        server.name(),
        &nick,
        &flags,
        &realname
    )
}
