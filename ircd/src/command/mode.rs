//! MODE, RFC 2812 3.1.5 / 3.2.3 and RFC 2811 4.
//!
//! The channel grammar is the awkward part: flag groups are interleaved
//! with the arguments their flags consume, positionally. `o v b e I k`
//! always take an argument (`k` on unset too), `l` only when setting. At
//! most three argument-taking flags are honoured per command. A trailing
//! argument-less `b`/`e`/`I` is a list query.

use std::{collections::VecDeque, sync::Arc};

use irc_codec::Message;
use itertools::Itertools;

use crate::{
    casemap::casefold,
    channel::Channel,
    client::Client,
    errors::HandleResult,
    make_numeric,
    modes::{normalize_mask, ChannelFlagSet, ChannelModeFlag, MemberModeFlag, UserModeFlag, UserModeSet},
    numeric_error,
    server::Server,
};

/// Argument-taking flags honoured in one MODE command.
const MAX_MODE_ARGS: usize = 3;

/// One effective change, kept in command order for the broadcast.
struct ModeChange {
    add: bool,
    flag: char,
    param: Option<String>,
}

pub(super) fn handle(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    let target = &message.params[0];
    match server.directory().channel(target) {
        Some(channel) => {
            if !client.is_registered() {
                return numeric_error!(NotRegistered);
            }
            channel_mode(server, client, &channel, message)
        }
        None => user_mode(server, client, message),
    }
}

/// User modes. The target must be the issuer; `a` only moves via AWAY,
/// `o`/`O` cannot be self-granted and `r` cannot be self-dropped.
fn user_mode(server: &Arc<Server>, client: &Arc<Client>, message: &Message) -> HandleResult {
    let target = &message.params[0];
    if client.folded_nick() != Some(casefold(target)) {
        return numeric_error!(UsersDontMatch);
    }

    if message.params.len() == 1 {
        let modes = client.modes_format();
        client.send_numeric(server, make_numeric!(UmodeIs, &modes));
        return Ok(());
    }

    for group in &message.params[1..] {
        let mut chars = group.chars();
        let add = match chars.next() {
            Some('+') => true,
            Some('-') => false,
            _ => return numeric_error!(UmodeUnknownFlag),
        };
        for c in chars {
            let flag = match UserModeSet::flag_for(c) {
                None | Some(UserModeFlag::Away) => return numeric_error!(UmodeUnknownFlag),
                Some(flag) => flag,
            };
            if add {
                match flag {
                    // operator status only comes from OPER
                    UserModeFlag::Oper | UserModeFlag::LocalOper => {}
                    _ => client.add_mode(flag),
                }
            } else {
                match flag {
                    UserModeFlag::Restricted => {}
                    _ => client.remove_mode(flag),
                }
            }
        }
    }

    let modes = client.modes_format();
    client.send_numeric(server, make_numeric!(UmodeIs, &modes));
    Ok(())
}

fn channel_mode(
    server: &Arc<Server>,
    client: &Arc<Client>,
    channel: &Arc<Channel>,
    message: &Message,
) -> HandleResult {
    let folded = client.folded_nick().unwrap_or_default();

    // a secret channel does not exist for outsiders
    if channel.has_flag(ChannelModeFlag::Secret) && !channel.is_member(&folded) {
        return numeric_error!(NoSuchChannel, channel.name());
    }

    if message.params.len() == 1 {
        let modes = channel.modes().format();
        client.send_numeric(
            server,
            make_numeric!(ChannelModeIs, channel.name(), &modes),
        );
        return Ok(());
    }

    if !channel.member_is_op(&folded) {
        return numeric_error!(ChanOpPrivsNeeded, channel.name());
    }

    let mut pending: VecDeque<(bool, char)> = VecDeque::new();
    let mut changes: Vec<ModeChange> = Vec::new();
    let mut arg_count = 0;

    'params: for param in &message.params[1..] {
        if let Some((add, flag)) = pending.pop_front() {
            arg_count += 1;
            if arg_count > MAX_MODE_ARGS {
                pending.clear();
                break 'params;
            }
            apply_arg_mode(server, channel, add, flag, param, &mut changes);
        } else {
            let mut add = true;
            for c in param.chars() {
                match c {
                    '+' => add = true,
                    '-' => add = false,
                    'o' | 'v' | 'b' | 'e' | 'I' | 'k' => pending.push_back((add, c)),
                    'l' if add => pending.push_back((add, 'l')),
                    'l' => {
                        if channel.modes_mut().limit.take().is_some() {
                            changes.push(ModeChange {
                                add: false,
                                flag: 'l',
                                param: None,
                            });
                        }
                    }
                    _ => apply_simple_mode(server, client, channel, add, c, &mut changes),
                }
            }
        }
    }

    if changes.is_empty() {
        // an argument-less b/e/I is a query for the corresponding list
        if let Some((_, flag)) = pending.front() {
            send_mask_list(server, client, channel, *flag);
        }
        return Ok(());
    }

    broadcast_changes(server, client, channel, &changes);
    Ok(())
}

/// Applies one flag that takes no argument. Refusals are reported but do
/// not abort the rest of the command.
fn apply_simple_mode(
    server: &Server,
    client: &Client,
    channel: &Channel,
    add: bool,
    c: char,
    changes: &mut Vec<ModeChange>,
) {
    let Some(flag) = ChannelFlagSet::flag_for(c) else {
        client.send_numeric(server, make_numeric!(UnknownMode, c, channel.name()));
        return;
    };

    // anonymous is exclusive to !-channels and irrevocable there
    if flag == ChannelModeFlag::Anonymous && (!channel.name().starts_with('!') || !add) {
        client.send_numeric(server, make_numeric!(UnknownMode, c, channel.name()));
        return;
    }

    let mut modes = channel.modes_mut();
    let had = modes.flags.is_set(flag);
    if add {
        if had {
            return;
        }
        // private and secret exclude each other
        if flag == ChannelModeFlag::Private && modes.flags.is_set(ChannelModeFlag::Secret) {
            modes.flags.unset(ChannelModeFlag::Secret);
            changes.push(ModeChange {
                add: false,
                flag: 's',
                param: None,
            });
        }
        if flag == ChannelModeFlag::Secret && modes.flags.is_set(ChannelModeFlag::Private) {
            modes.flags.unset(ChannelModeFlag::Private);
            changes.push(ModeChange {
                add: false,
                flag: 'p',
                param: None,
            });
        }
        modes.flags.set(flag);
        changes.push(ModeChange {
            add: true,
            flag: c,
            param: None,
        });
    } else if had {
        modes.flags.unset(flag);
        changes.push(ModeChange {
            add: false,
            flag: c,
            param: None,
        });
    }
}

/// Applies one flag together with the argument it consumed. Only effective
/// changes are recorded.
fn apply_arg_mode(
    server: &Server,
    channel: &Channel,
    add: bool,
    flag: char,
    param: &str,
    changes: &mut Vec<ModeChange>,
) {
    match flag {
        'o' | 'v' => {
            let member_flag = if flag == 'o' {
                MemberModeFlag::Op
            } else {
                MemberModeFlag::Voice
            };
            if server.directory().client_by_nick(param).is_none() {
                return;
            }
            // membership grants are echoed verbatim, redundant or not
            if channel
                .update_member_mode(&casefold(param), member_flag, add)
                .is_some()
            {
                changes.push(ModeChange {
                    add,
                    flag,
                    param: Some(param.to_string()),
                });
            }
        }
        'l' => {
            if let Ok(limit) = param.parse::<usize>() {
                let mut modes = channel.modes_mut();
                if modes.limit != Some(limit) {
                    modes.limit = Some(limit);
                    changes.push(ModeChange {
                        add: true,
                        flag: 'l',
                        param: Some(param.to_string()),
                    });
                }
            }
        }
        'k' => {
            let mut modes = channel.modes_mut();
            if add {
                if modes.key.as_deref() != Some(param) {
                    modes.key = Some(param.to_string());
                    changes.push(ModeChange {
                        add: true,
                        flag: 'k',
                        param: Some(param.to_string()),
                    });
                }
            } else if modes.key.take().is_some() {
                changes.push(ModeChange {
                    add: false,
                    flag: 'k',
                    param: Some(param.to_string()),
                });
            }
        }
        'b' | 'e' | 'I' => {
            let mask = normalize_mask(param);
            let mut modes = channel.modes_mut();
            let Some(masks) = modes.masks_mut(flag) else {
                return;
            };
            let changed = if add {
                masks.insert(mask.clone())
            } else {
                masks.remove(&mask)
            };
            if changed {
                changes.push(ModeChange {
                    add,
                    flag,
                    param: Some(mask),
                });
            }
        }
        _ => {}
    }
}

fn send_mask_list(server: &Server, client: &Client, channel: &Channel, flag: char) {
    let masks: Vec<String> = channel
        .modes()
        .masks(flag)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default();
    match flag {
        'b' => {
            for mask in &masks {
                client.send_numeric(server, make_numeric!(BanList, channel.name(), mask));
            }
            client.send_numeric(server, make_numeric!(EndOfBanList, channel.name()));
        }
        'e' => {
            for mask in &masks {
                client.send_numeric(server, make_numeric!(ExceptList, channel.name(), mask));
            }
            client.send_numeric(server, make_numeric!(EndOfExceptList, channel.name()));
        }
        'I' => {
            for mask in &masks {
                client.send_numeric(server, make_numeric!(InviteList, channel.name(), mask));
            }
            client.send_numeric(server, make_numeric!(EndOfInviteList, channel.name()));
        }
        _ => {}
    }
}

/// Compacts consecutive same-signed changes under one `+`/`-` and announces
/// the result to every member.
fn broadcast_changes(server: &Server, client: &Client, channel: &Channel, changes: &[ModeChange]) {
    let mut mode_str = String::new();
    let mut params = Vec::new();
    for (add, group) in &changes.iter().group_by(|change| change.add) {
        mode_str.push(if add { '+' } else { '-' });
        for change in group {
            mode_str.push(change.flag);
            if let Some(param) = &change.param {
                params.push(param.clone());
            }
        }
    }

    let mut announce = Message::with_prefix(client.prefix(), "MODE")
        .param(channel.name())
        .param(mode_str);
    for param in params {
        announce = announce.param(param);
    }
    let line = announce.to_string();
    for peer in channel.member_clients(server) {
        peer.send(line.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{build_server, registered_client};
    use crate::{client::Client, server::Server};

    fn dispatch(server: &Arc<Server>, client: &Arc<Client>, line: &str) {
        let message = Message::parse(line).unwrap();
        server.mux().dispatch(server, client, &message);
    }

    fn channel_with_op(
        server: &Arc<Server>,
        op: &Arc<Client>,
        others: &[&Arc<Client>],
    ) -> Arc<Channel> {
        let channel = server.directory().channel_or_create("#x");
        channel.join(server, op, "");
        for other in others {
            channel.join(server, other, "");
        }
        channel
    }

    #[test]
    fn user_mode_query_and_mutation() {
        let server = build_server();
        let (alice, mut out) = registered_client(&server, "alice", 1);

        dispatch(&server, &alice, "MODE alice");
        assert!(out.saw(" 221 alice +"));

        dispatch(&server, &alice, "MODE alice +iw");
        assert!(alice.has_mode(UserModeFlag::Invisible));
        assert!(alice.has_mode(UserModeFlag::WallOps));
        assert!(out.saw(" 221 alice +iw"));

        dispatch(&server, &alice, "MODE alice -i");
        assert!(!alice.has_mode(UserModeFlag::Invisible));
    }

    #[test]
    fn user_mode_guards() {
        let server = build_server();
        let (alice, mut out) = registered_client(&server, "alice", 1);
        let (_bob, _bob_out) = registered_client(&server, "bob", 2);

        dispatch(&server, &alice, "MODE bob +i");
        assert!(out.saw(" 502 "));

        // away only moves via AWAY
        dispatch(&server, &alice, "MODE alice +a");
        assert!(out.saw(" 501 "));
        assert!(!alice.has_mode(UserModeFlag::Away));

        // no self-granted operator status
        dispatch(&server, &alice, "MODE alice +o");
        assert!(!alice.has_mode(UserModeFlag::Oper));

        // restricted cannot be dropped
        dispatch(&server, &alice, "MODE alice +r");
        dispatch(&server, &alice, "MODE alice -r");
        assert!(alice.has_mode(UserModeFlag::Restricted));
    }

    #[test]
    fn channel_mode_query_round_trips() {
        let server = build_server();
        let (alice, mut out) = registered_client(&server, "alice", 1);
        channel_with_op(&server, &alice, &[]);

        dispatch(&server, &alice, "MODE #x +tk sesame");
        out.clear();
        dispatch(&server, &alice, "MODE #x");
        assert!(out.saw(" 324 alice #x +tk sesame"));

        dispatch(&server, &alice, "MODE #x -t-k sesame");
        out.clear();
        dispatch(&server, &alice, "MODE #x");
        assert!(out.saw(" 324 alice #x +"));
    }

    #[test]
    fn channel_mode_changes_compact_into_one_broadcast() {
        let server = build_server();
        let (alice, _alice_out) = registered_client(&server, "alice", 1);
        let (bob, mut bob_out) = registered_client(&server, "bob", 2);
        let channel = channel_with_op(&server, &alice, &[&bob]);

        bob_out.clear();
        dispatch(&server, &alice, "MODE #x +o-v+t bob bob");
        let lines = bob_out.lines();
        assert!(lines
            .iter()
            .any(|l| l.contains("MODE #x +o-v+t bob bob")));
        assert!(channel.member_is_op("bob"));
        assert!(!channel
            .member_modes("bob")
            .unwrap()
            .is_set(MemberModeFlag::Voice));
        assert!(channel.has_flag(ChannelModeFlag::TopicLock));
    }

    #[test]
    fn private_and_secret_exclude_each_other() {
        let server = build_server();
        let (alice, mut out) = registered_client(&server, "alice", 1);
        let channel = channel_with_op(&server, &alice, &[]);

        dispatch(&server, &alice, "MODE #x +p");
        out.clear();
        dispatch(&server, &alice, "MODE #x +s");
        // the implicit removal is part of the announced change
        assert!(out.saw("MODE #x -p+s"));
        assert!(channel.has_flag(ChannelModeFlag::Secret));
        assert!(!channel.has_flag(ChannelModeFlag::Private));

        dispatch(&server, &alice, "MODE #x +p");
        assert!(channel.has_flag(ChannelModeFlag::Private));
        assert!(!channel.has_flag(ChannelModeFlag::Secret));
    }

    #[test]
    fn anonymous_flag_is_exclusive_to_bang_channels() {
        let server = build_server();
        let (alice, mut out) = registered_client(&server, "alice", 1);
        channel_with_op(&server, &alice, &[]);

        dispatch(&server, &alice, "MODE #x +a");
        assert!(out.saw(" 472 alice a "));

        let bang = server.directory().channel_or_create("!chan");
        bang.join(&server, &alice, "");
        out.clear();
        dispatch(&server, &alice, "MODE !chan +a");
        assert!(bang.has_flag(ChannelModeFlag::Anonymous));

        dispatch(&server, &alice, "MODE !chan -a");
        assert!(out.saw(" 472 alice a "));
        assert!(bang.has_flag(ChannelModeFlag::Anonymous));
    }

    #[test]
    fn unsupported_channel_modes_are_unknown() {
        let server = build_server();
        let (alice, mut out) = registered_client(&server, "alice", 1);
        channel_with_op(&server, &alice, &[]);

        for flag in ["+q", "+r", "+O"] {
            out.clear();
            dispatch(&server, &alice, &format!("MODE #x {}", flag));
            assert!(out.saw(" 472 "), "expected 472 for {}", flag);
        }
    }

    #[test]
    fn mask_modes_normalise_store_and_list() {
        let server = build_server();
        let (alice, mut out) = registered_client(&server, "alice", 1);
        let channel = channel_with_op(&server, &alice, &[]);

        dispatch(&server, &alice, "MODE #x +b spammer");
        assert!(channel.modes().ban_masks.contains("spammer!*@*"));
        assert!(out.saw("MODE #x +b spammer!*@*"));

        // duplicate insert is not an effective change
        out.clear();
        dispatch(&server, &alice, "MODE #x +b spammer!*@*");
        assert!(!out.saw("MODE #x"));

        out.clear();
        dispatch(&server, &alice, "MODE #x +b");
        let lines = out.lines();
        assert!(lines.iter().any(|l| l.contains(" 367 ") && l.contains("spammer!*@*")));
        assert!(lines.iter().any(|l| l.contains(" 368 ")));

        dispatch(&server, &alice, "MODE #x -b spammer");
        assert!(channel.modes().ban_masks.is_empty());

        out.clear();
        dispatch(&server, &alice, "MODE #x +e");
        assert!(out.saw(" 349 "));
        out.clear();
        dispatch(&server, &alice, "MODE #x +I");
        assert!(out.saw(" 347 "));
    }

    #[test]
    fn at_most_three_argument_flags_apply() {
        let server = build_server();
        let (alice, _alice_out) = registered_client(&server, "alice", 1);
        let (bob, _bob_out) = registered_client(&server, "bob", 2);
        let channel = channel_with_op(&server, &alice, &[&bob]);

        dispatch(&server, &alice, "MODE #x +bbbb a b c d");
        let modes = channel.modes();
        assert_eq!(modes.ban_masks.len(), 3);
        assert!(!modes.ban_masks.contains("d!*@*"));
    }

    #[test]
    fn unset_key_consumes_its_argument() {
        let server = build_server();
        let (alice, _alice_out) = registered_client(&server, "alice", 1);
        let (bob, _bob_out) = registered_client(&server, "bob", 2);
        let channel = channel_with_op(&server, &alice, &[&bob]);

        dispatch(&server, &alice, "MODE #x +k sesame");
        // the key argument is consumed even on unset, so `bob` goes to -k
        // and never reaches +o
        dispatch(&server, &alice, "MODE #x -k+o sesame bob");
        assert!(channel.modes().key.is_none());
        assert!(channel.member_is_op("bob"));
    }

    #[test]
    fn channel_mode_permissions() {
        let server = build_server();
        let (alice, _alice_out) = registered_client(&server, "alice", 1);
        let (bob, mut bob_out) = registered_client(&server, "bob", 2);
        let (carol, mut carol_out) = registered_client(&server, "carol", 3);
        let channel = channel_with_op(&server, &alice, &[&bob]);

        // a member without ops may query but not mutate
        bob_out.clear();
        dispatch(&server, &bob, "MODE #x");
        assert!(bob_out.saw(" 324 "));
        dispatch(&server, &bob, "MODE #x +t");
        assert!(bob_out.saw(" 482 "));
        assert!(!channel.has_flag(ChannelModeFlag::TopicLock));

        // a secret channel does not exist for outsiders
        dispatch(&server, &alice, "MODE #x +s");
        carol_out.clear();
        dispatch(&server, &carol, "MODE #x");
        assert!(carol_out.saw(" 403 "));
    }
}
