//! Channels: membership, topic, modes and message fan-out.
//!
//! Membership and the mode state sit behind separate locks; fan-out always
//! snapshots the member list and releases the lock before touching peer
//! connections. The identity key throughout is the casefolded nickname.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use irc_codec::Message;
use itertools::Itertools;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    casemap::casefold,
    client::Client,
    errors::HandleResult,
    make_numeric,
    modes::{ChannelModeFlag, ChannelModes, MemberModeFlag, MemberModeSet, UserModeFlag},
    numeric::Numeric,
    numeric_error,
    server::Server,
};

/// Nicks per RPL_NAMREPLY line.
const NAMES_BATCH: usize = 20;

/// Longest accepted channel name, per RFC 2812 §1.3.
const MAX_CHANNEL_NAME_LEN: usize = 50;

/// How a join attempt ended. Refusals have already been answered with the
/// appropriate numeric by the time this is returned.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    Refused,
    /// The channel was reaped between lookup and join; look it up again.
    Defunct,
}

pub struct Channel {
    name: String,
    folded: String,
    topic: RwLock<String>,
    modes: RwLock<ChannelModes>,
    members: RwLock<HashMap<String, MemberModeSet>>,
    defunct: AtomicBool,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            folded: casefold(name),
            topic: RwLock::new(String::new()),
            modes: RwLock::new(ChannelModes::new()),
            members: RwLock::new(HashMap::new()),
            defunct: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folded_name(&self) -> &str {
        &self.folded
    }

    pub fn member_count(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_member(&self, folded_nick: &str) -> bool {
        self.members.read().contains_key(folded_nick)
    }

    pub fn member_modes(&self, folded_nick: &str) -> Option<MemberModeSet> {
        self.members.read().get(folded_nick).copied()
    }

    pub fn member_is_op(&self, folded_nick: &str) -> bool {
        self.member_modes(folded_nick)
            .map(|m| m.is_set(MemberModeFlag::Op))
            .unwrap_or(false)
    }

    /// Flips one member mode. `None` when the nick is not a member;
    /// otherwise whether the flag actually changed.
    pub fn update_member_mode(
        &self,
        folded_nick: &str,
        flag: MemberModeFlag,
        add: bool,
    ) -> Option<bool> {
        let mut members = self.members.write();
        let modes = members.get_mut(folded_nick)?;
        let had = modes.is_set(flag);
        if add {
            modes.set(flag);
        } else {
            modes.unset(flag);
        }
        Some(had != add)
    }

    pub fn rename_member(&self, old_folded: &str, new_folded: &str) {
        let mut members = self.members.write();
        if let Some(modes) = members.remove(old_folded) {
            members.insert(new_folded.to_string(), modes);
        }
    }

    pub(crate) fn modes(&self) -> RwLockReadGuard<ChannelModes> {
        self.modes.read()
    }

    pub(crate) fn modes_mut(&self) -> RwLockWriteGuard<ChannelModes> {
        self.modes.write()
    }

    pub fn has_flag(&self, flag: ChannelModeFlag) -> bool {
        self.modes.read().flags.is_set(flag)
    }

    pub fn is_defunct(&self) -> bool {
        self.defunct.load(Ordering::SeqCst)
    }

    /// Called with the Directory's channel-map lock held: condemns the
    /// channel if nobody is left, so late joiners retry instead of
    /// resurrecting it.
    pub(crate) fn mark_defunct_if_empty(&self) -> bool {
        let members = self.members.write();
        if members.is_empty() {
            self.defunct.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Member handles for fan-out. Snapshots the nick list first; peer
    /// resolution happens after the membership lock is released, since the
    /// Directory lock must never be taken inside a Channel lock.
    pub fn member_clients(&self, server: &Server) -> Vec<Arc<Client>> {
        let nicks: Vec<String> = self.members.read().keys().cloned().collect();
        nicks
            .iter()
            .filter_map(|nick| server.directory().client_by_nick(nick))
            .collect()
    }

    fn broadcast(&self, server: &Server, line: &str) {
        for peer in self.member_clients(server) {
            peer.send(line);
        }
    }

    fn broadcast_to_others(&self, server: &Server, sender: &Client, line: &str) {
        for peer in self.member_clients(server) {
            if peer.addr() != sender.addr() {
                peer.send(line);
            }
        }
    }

    /// Admits a client. Key and limit are checked under the membership
    /// lock; the first member becomes channel operator and, when it supplied
    /// a key, sets the channel key. The joiner gets the topic (if any) and a
    /// NAMES reply; everyone gets the JOIN.
    pub fn join(self: &Arc<Self>, server: &Server, client: &Arc<Client>, key: &str) -> JoinOutcome {
        let Some(folded) = client.folded_nick() else {
            return JoinOutcome::Refused;
        };

        let creator;
        {
            let mut members = self.members.write();
            if self.is_defunct() {
                return JoinOutcome::Defunct;
            }
            if members.contains_key(&folded) {
                return JoinOutcome::AlreadyMember;
            }

            let refusal = {
                let modes = self.modes.read();
                match (&modes.key, modes.limit) {
                    (Some(required), _) if key != required => {
                        Some(make_numeric!(BadChannelKey, &self.name))
                    }
                    (_, Some(limit)) if members.len() >= limit => {
                        Some(make_numeric!(ChannelIsFull, &self.name))
                    }
                    _ => None,
                }
            };
            if let Some(numeric) = refusal {
                drop(members);
                client.send_numeric(server, numeric);
                return JoinOutcome::Refused;
            }

            creator = members.is_empty();
            let mut member_modes = MemberModeSet::new();
            if creator {
                member_modes.set(MemberModeFlag::Op);
            }
            members.insert(folded, member_modes);
        }

        if creator && !key.is_empty() {
            self.modes.write().key = Some(key.to_string());
        }

        client.add_channel(self);

        let topic = self.topic.read().clone();
        if !topic.is_empty() {
            client.send_numeric(server, make_numeric!(Topic, &self.name, &topic));
        }

        let join = Message::with_prefix(client.prefix(), "JOIN").param(&self.name);
        self.broadcast(server, &join.to_string());

        self.names(server, client);
        JoinOutcome::Joined
    }

    /// Announces the departure to everyone (the leaver included), then
    /// removes the membership and reaps the channel if it emptied.
    pub fn part(
        self: &Arc<Self>,
        server: &Server,
        client: &Client,
        reason: &str,
    ) -> HandleResult {
        let folded = client.folded_nick().unwrap_or_default();
        if !self.is_member(&folded) {
            return numeric_error!(NotOnChannel, &self.name);
        }

        let mut part = Message::with_prefix(client.prefix(), "PART").param(&self.name);
        if !reason.is_empty() {
            part = part.trailing(reason);
        }
        self.broadcast(server, &part.to_string());

        self.members.write().remove(&folded);
        client.remove_channel(&self.folded);
        server.directory().remove_channel_if_empty(self);
        Ok(())
    }

    /// Like part but silent towards the leaving client: no error when they
    /// were never a member, and the QUIT goes to the others only.
    pub fn quit(self: &Arc<Self>, server: &Server, client: &Client, reason: &str) {
        let folded = client.folded_nick().unwrap_or_default();
        if self.members.write().remove(&folded).is_none() {
            return;
        }

        let quit = Message::with_prefix(client.prefix(), "QUIT").trailing(reason);
        self.broadcast(server, &quit.to_string());
        server.directory().remove_channel_if_empty(self);
    }

    /// Ejects each target in turn. The kicker must be a member holding ops;
    /// targets that are not members are reported individually.
    pub fn kick(
        self: &Arc<Self>,
        server: &Server,
        operator: &Arc<Client>,
        targets: &[&str],
        comment: &str,
    ) -> HandleResult {
        let folded = operator.folded_nick().unwrap_or_default();
        if !self.is_member(&folded) {
            return numeric_error!(NotOnChannel, &self.name);
        }
        if !self.member_is_op(&folded) {
            return numeric_error!(ChanOpPrivsNeeded, &self.name);
        }

        for target in targets {
            let target_folded = casefold(target);
            if !self.is_member(&target_folded) {
                operator.send_numeric(server, make_numeric!(UserNotInChannel, target, &self.name));
                continue;
            }

            let kick = Message::with_prefix(operator.prefix(), "KICK")
                .param(&self.name)
                .param(*target)
                .trailing(comment);
            self.broadcast(server, &kick.to_string());

            self.members.write().remove(&target_folded);
            if let Some(client) = server.directory().client_by_nick(target) {
                client.remove_channel(&self.folded);
            }
        }
        server.directory().remove_channel_if_empty(self);
        Ok(())
    }

    /// Relays a PRIVMSG to every member but the sender.
    pub fn message(&self, server: &Server, sender: &Client, text: &str) {
        let privmsg = Message::with_prefix(sender.prefix(), "PRIVMSG")
            .param(&self.name)
            .trailing(text);
        self.broadcast_to_others(server, sender, &privmsg.to_string());
    }

    /// Relays a NOTICE to every member but the sender.
    pub fn notice(&self, server: &Server, sender: &Client, text: &str) {
        let notice = Message::with_prefix(sender.prefix(), "NOTICE")
            .param(&self.name)
            .trailing(text);
        self.broadcast_to_others(server, sender, &notice.to_string());
    }

    /// Queries or sets the topic. Setting needs ops unless the channel is
    /// not topic-locked; a successful set is announced to all members.
    pub fn topic_command(&self, server: &Server, client: &Client, topic: &str) -> HandleResult {
        let folded = client.folded_nick().unwrap_or_default();
        if !self.is_member(&folded) {
            return numeric_error!(NotOnChannel, &self.name);
        }

        if topic.is_empty() {
            let current = self.topic.read().clone();
            if current.is_empty() {
                client.send_numeric(server, make_numeric!(NoTopic, &self.name));
            } else {
                client.send_numeric(server, make_numeric!(Topic, &self.name, &current));
            }
            return Ok(());
        }

        let may_set = self.member_is_op(&folded) || !self.has_flag(ChannelModeFlag::TopicLock);
        if !may_set {
            return numeric_error!(ChanOpPrivsNeeded, &self.name);
        }

        *self.topic.write() = topic.to_string();
        let announce = Message::with_prefix(client.prefix(), "TOPIC")
            .param(&self.name)
            .trailing(topic);
        self.broadcast(server, &announce.to_string());
        Ok(())
    }

    /// NAMES for this channel. Secret and private channels are invisible to
    /// non-members; invisible users are listed only to fellow members.
    /// Visible output always ends with ENDOFNAMES.
    pub fn names(&self, server: &Server, client: &Client) {
        let is_member = client
            .folded_nick()
            .map(|folded| self.is_member(&folded))
            .unwrap_or(false);

        let (secret, private) = {
            let modes = self.modes.read();
            (
                modes.flags.is_set(ChannelModeFlag::Secret),
                modes.flags.is_set(ChannelModeFlag::Private),
            )
        };
        if (secret || private) && !is_member {
            return;
        }
        let visibility = if secret {
            '@'
        } else if private {
            '*'
        } else {
            '='
        };

        let entries: Vec<(String, MemberModeSet)> = {
            let members = self.members.read();
            members.iter().map(|(n, m)| (n.clone(), *m)).collect()
        };

        let mut names = Vec::new();
        for (nick, member_modes) in entries {
            let Some(peer) = server.directory().client_by_nick(&nick) else {
                continue;
            };
            if peer.has_mode(UserModeFlag::Invisible) && !is_member {
                continue;
            }
            let mut shown = String::new();
            if let Some(sigil) = member_modes.name_prefix() {
                shown.push(sigil);
            }
            shown.push_str(&peer.display_nick());
            names.push(shown);
        }

        for batch in names.chunks(NAMES_BATCH) {
            let mut line: String = batch.iter().join(" ");
            line.push(' ');
            client.send_numeric(
                server,
                make_numeric!(NamesReply, visibility, &self.name, &line),
            );
        }
        client.send_numeric(server, make_numeric!(EndOfNames, &self.name));
    }

    /// The RPL_LIST entry for this channel, if the requester may see one.
    /// Secret channels are omitted entirely for non-members; private ones
    /// appear with a blank topic.
    pub fn list_numeric(&self, client: &Client) -> Option<Numeric> {
        let is_member = client
            .folded_nick()
            .map(|folded| self.is_member(&folded))
            .unwrap_or(false);

        let (secret, private) = {
            let modes = self.modes.read();
            (
                modes.flags.is_set(ChannelModeFlag::Secret),
                modes.flags.is_set(ChannelModeFlag::Private),
            )
        };
        if secret && !is_member {
            return None;
        }
        let topic = if private && !is_member {
            String::new()
        } else {
            self.topic.read().clone()
        };
        Some(make_numeric!(
            List,
            &self.name,
            self.member_count(),
            &topic
        ))
    }
}

/// Channel-name validity per RFC 2812 §1.3: leading `& # + !`, then no
/// spaces, commas, ^G or NUL, at most fifty bytes in all.
pub fn valid_channel_name(name: &str) -> bool {
    let mut chars = name.chars();
    if !matches!(chars.next(), Some('&' | '#' | '+' | '!')) {
        return false;
    }
    if name.len() > MAX_CHANNEL_NAME_LEN || name.len() < 2 {
        return false;
    }
    !name.contains([' ', ',', '\x07', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{build_server, registered_client};

    #[test]
    fn first_joiner_creates_holds_ops_and_sets_key() {
        let server = build_server();
        let (alice, mut alice_out) = registered_client(&server, "alice", 1);

        let channel = server.directory().channel_or_create("#x");
        assert_eq!(channel.join(&server, &alice, "sesame"), JoinOutcome::Joined);

        assert!(channel.member_is_op("alice"));
        assert_eq!(channel.modes().key.as_deref(), Some("sesame"));
        assert!(alice.is_on("#x"));

        let lines = alice_out.lines();
        assert!(lines.iter().any(|l| l.contains("JOIN #x")));
        assert!(lines.iter().any(|l| l.contains("353") && l.contains("@alice ")));
        assert!(lines.iter().any(|l| l.contains("366")));
        // empty topic: no RPL_TOPIC on join
        assert!(!lines.iter().any(|l| l.contains(" 332 ")));
    }

    #[test]
    fn rejoining_is_a_silent_no_op() {
        let server = build_server();
        let (alice, mut alice_out) = registered_client(&server, "alice", 1);

        let channel = server.directory().channel_or_create("#x");
        channel.join(&server, &alice, "");
        alice_out.clear();

        assert_eq!(channel.join(&server, &alice, ""), JoinOutcome::AlreadyMember);
        assert_eq!(channel.member_count(), 1);
        assert!(alice_out.lines().is_empty());
    }

    #[test]
    fn join_checks_key_and_aborts_at_limit() {
        let server = build_server();
        let (alice, _alice_out) = registered_client(&server, "alice", 1);
        let (bob, mut bob_out) = registered_client(&server, "bob", 2);
        let (carol, mut carol_out) = registered_client(&server, "carol", 3);

        let channel = server.directory().channel_or_create("#x");
        channel.join(&server, &alice, "sesame");

        assert_eq!(channel.join(&server, &bob, "wrong"), JoinOutcome::Refused);
        assert!(bob_out.saw(" 475 "));
        assert!(!channel.is_member("bob"));

        assert_eq!(channel.join(&server, &bob, "sesame"), JoinOutcome::Joined);

        channel.modes_mut().limit = Some(2);
        assert_eq!(channel.join(&server, &carol, "sesame"), JoinOutcome::Refused);
        assert!(carol_out.saw(" 471 "));
        assert!(!channel.is_member("carol"));
        assert!(!carol.is_on("#x"));
    }

    #[test]
    fn part_broadcasts_then_reaps_when_empty() {
        let server = build_server();
        let (alice, mut alice_out) = registered_client(&server, "alice", 1);
        let (bob, mut bob_out) = registered_client(&server, "bob", 2);

        let channel = server.directory().channel_or_create("#x");
        channel.join(&server, &alice, "");
        channel.join(&server, &bob, "");
        alice_out.clear();
        bob_out.clear();

        channel.part(&server, &bob, "gone").unwrap();
        assert!(alice_out.saw("PART #x :gone"));
        assert!(bob_out.saw("PART #x :gone"));
        assert!(!bob.is_on("#x"));
        assert!(server.directory().channel("#x").is_some());

        channel.part(&server, &alice, "").unwrap();
        assert!(server.directory().channel("#x").is_none());
        assert!(channel.is_defunct());
    }

    #[test]
    fn part_by_non_member_is_an_error() {
        let server = build_server();
        let (alice, _alice_out) = registered_client(&server, "alice", 1);
        let (bob, _bob_out) = registered_client(&server, "bob", 2);

        let channel = server.directory().channel_or_create("#x");
        channel.join(&server, &alice, "");
        assert!(channel.part(&server, &bob, "").is_err());
    }

    #[test]
    fn quit_is_silent_towards_the_leaver() {
        let server = build_server();
        let (alice, mut alice_out) = registered_client(&server, "alice", 1);
        let (bob, mut bob_out) = registered_client(&server, "bob", 2);

        let channel = server.directory().channel_or_create("#x");
        channel.join(&server, &alice, "");
        channel.join(&server, &bob, "");
        alice_out.clear();
        bob_out.clear();

        channel.quit(&server, &bob, "gone");
        assert!(alice_out.saw("QUIT :gone"));
        assert!(bob_out.lines().is_empty());
        assert!(!channel.is_member("bob"));

        // quitting a channel you never joined stays silent
        channel.quit(&server, &bob, "again");
        assert!(alice_out.lines().is_empty());
    }

    #[test]
    fn kick_needs_ops_and_reports_each_target() {
        let server = build_server();
        let (alice, _alice_out) = registered_client(&server, "alice", 1);
        let (bob, mut bob_out) = registered_client(&server, "bob", 2);
        let (carol, mut carol_out) = registered_client(&server, "carol", 3);

        let channel = server.directory().channel_or_create("#x");
        channel.join(&server, &alice, "");
        channel.join(&server, &bob, "");

        // bob holds no ops
        assert!(channel.kick(&server, &bob, &["alice"], "no").is_err());
        assert!(channel.is_member("alice"));

        // carol is not even a member
        assert!(channel.kick(&server, &carol, &["alice"], "no").is_err());

        bob_out.clear();
        carol_out.clear();
        channel
            .kick(&server, &alice, &["ghost", "bob"], "spam")
            .unwrap();
        // per-target refusal does not abort the rest
        assert!(!channel.is_member("bob"));
        assert!(!bob.is_on("#x"));
        assert!(bob_out.saw("KICK #x bob :spam"));
        // the kicker persists and so does the channel
        assert!(channel.is_member("alice"));
        assert!(server.directory().channel("#x").is_some());
    }

    #[test]
    fn topic_set_respects_lock_and_broadcasts() {
        let server = build_server();
        let (alice, mut alice_out) = registered_client(&server, "alice", 1);
        let (bob, mut bob_out) = registered_client(&server, "bob", 2);

        let channel = server.directory().channel_or_create("#x");
        channel.join(&server, &alice, "");
        channel.join(&server, &bob, "");
        alice_out.clear();
        bob_out.clear();

        // query with no topic set
        channel.topic_command(&server, &bob, "").unwrap();
        assert!(bob_out.saw(" 331 "));

        // without +t anyone may set
        channel.topic_command(&server, &bob, "hello").unwrap();
        assert!(alice_out.saw("TOPIC #x :hello"));

        channel
            .modes_mut()
            .flags
            .set(ChannelModeFlag::TopicLock);
        assert!(channel.topic_command(&server, &bob, "hijack").is_err());
        channel.topic_command(&server, &alice, "locked in").unwrap();

        bob_out.clear();
        channel.topic_command(&server, &bob, "").unwrap();
        let lines = bob_out.lines();
        assert!(lines
            .iter()
            .any(|l| l.contains(" 332 ") && l.contains("locked in")));
    }

    #[test]
    fn names_and_list_respect_secrecy() {
        let server = build_server();
        let (alice, mut alice_out) = registered_client(&server, "alice", 1);
        let (bob, mut bob_out) = registered_client(&server, "bob", 2);

        let channel = server.directory().channel_or_create("#x");
        channel.join(&server, &alice, "");
        channel.modes_mut().flags.set(ChannelModeFlag::Secret);

        bob_out.clear();
        channel.names(&server, &bob);
        assert!(bob_out.lines().is_empty());
        assert!(channel.list_numeric(&bob).is_none());

        // members still see it, flagged secret
        alice_out.clear();
        channel.names(&server, &alice);
        assert!(alice_out.saw(" 353 alice @ #x "));

        // private: listed but with a blank topic for outsiders
        {
            let mut modes = channel.modes_mut();
            modes.flags.unset(ChannelModeFlag::Secret);
            modes.flags.set(ChannelModeFlag::Private);
        }
        *channel.topic.write() = "members only".to_string();
        let listing = channel.list_numeric(&bob).unwrap();
        assert!(!listing.text().contains("members only"));
        let listing = channel.list_numeric(&alice).unwrap();
        assert!(listing.text().contains("members only"));
    }

    #[test]
    fn channel_names_validate() {
        assert!(valid_channel_name("#chat"));
        assert!(valid_channel_name("&local"));
        assert!(valid_channel_name("+modeless"));
        assert!(valid_channel_name("!ABCDEchan"));

        assert!(!valid_channel_name("chat"));
        assert!(!valid_channel_name("#"));
        assert!(!valid_channel_name("#with space"));
        assert!(!valid_channel_name("#with,comma"));
        assert!(!valid_channel_name("#with\x07bell"));
        assert!(!valid_channel_name(&format!("#{}", "x".repeat(60))));
    }

    #[test]
    fn member_mode_updates_report_changes() {
        let channel = Channel::new("#test");
        channel
            .members
            .write()
            .insert("alice".to_string(), MemberModeSet::new());

        assert_eq!(
            channel.update_member_mode("alice", MemberModeFlag::Op, true),
            Some(true)
        );
        // already set: no effective change
        assert_eq!(
            channel.update_member_mode("alice", MemberModeFlag::Op, true),
            Some(false)
        );
        assert!(channel.member_is_op("alice"));
        assert_eq!(channel.update_member_mode("ghost", MemberModeFlag::Op, true), None);
    }

    #[test]
    fn rename_member_keeps_modes() {
        let channel = Channel::new("#test");
        let mut modes = MemberModeSet::new();
        modes.set(MemberModeFlag::Voice);
        channel.members.write().insert("alice".to_string(), modes);

        channel.rename_member("alice", "alicia");
        assert!(!channel.is_member("alice"));
        assert!(channel
            .member_modes("alicia")
            .unwrap()
            .is_set(MemberModeFlag::Voice));
    }
}
