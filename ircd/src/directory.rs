//! Process-wide indexes shared by every connection task.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use parking_lot::RwLock;

use crate::{casemap::casefold, channel::Channel, client::Client};

/// The three shared maps. Each has its own lock, held only across the map
/// operation itself. When a Directory lock and a Channel lock are both
/// needed, the Directory lock is taken first.
#[derive(Default)]
pub struct Directory {
    clients: RwLock<HashMap<SocketAddr, Arc<Client>>>,
    nicks: RwLock<HashMap<String, Arc<Client>>>,
    channels: RwLock<HashMap<String, Arc<Channel>>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&self, client: Arc<Client>) {
        self.clients.write().insert(client.addr(), client);
    }

    pub fn remove_client(&self, addr: SocketAddr) {
        self.clients.write().remove(&addr);
    }

    pub fn client_by_addr(&self, addr: SocketAddr) -> Option<Arc<Client>> {
        self.clients.read().get(&addr).cloned()
    }

    /// Claims a nickname. Fails if another client already holds it; claiming
    /// a nick the same client already holds is a no-op.
    pub fn add_nick(&self, nick: &str, client: &Arc<Client>) -> Result<(), NickInUse> {
        let mut nicks = self.nicks.write();
        match nicks.get(&casefold(nick)) {
            Some(existing) if !Arc::ptr_eq(existing, client) => Err(NickInUse),
            _ => {
                nicks.insert(casefold(nick), Arc::clone(client));
                Ok(())
            }
        }
    }

    pub fn remove_nick(&self, nick: &str) {
        self.nicks.write().remove(&casefold(nick));
    }

    /// Atomically releases `old_nick` and claims `new_nick`. Nothing changes
    /// if the new name is held by a different client.
    pub fn update_nick(
        &self,
        old_nick: &str,
        new_nick: &str,
        client: &Arc<Client>,
    ) -> Result<(), NickInUse> {
        let mut nicks = self.nicks.write();
        if let Some(existing) = nicks.get(&casefold(new_nick)) {
            if !Arc::ptr_eq(existing, client) {
                return Err(NickInUse);
            }
        }
        nicks.remove(&casefold(old_nick));
        nicks.insert(casefold(new_nick), Arc::clone(client));
        Ok(())
    }

    pub fn client_by_nick(&self, nick: &str) -> Option<Arc<Client>> {
        self.nicks.read().get(&casefold(nick)).cloned()
    }

    /// Snapshot of every client currently holding a nickname.
    pub fn nick_clients(&self) -> Vec<Arc<Client>> {
        self.nicks.read().values().cloned().collect()
    }

    /// Returns the channel with the given name, creating it when absent.
    ///
    /// The caller must be prepared for the returned channel to be defunct if
    /// its last member left between this lookup and the membership insert;
    /// joining a defunct channel reports as much so the caller can retry.
    pub fn channel_or_create(&self, name: &str) -> Arc<Channel> {
        let mut channels = self.channels.write();
        Arc::clone(
            channels
                .entry(casefold(name))
                .or_insert_with(|| Arc::new(Channel::new(name))),
        )
    }

    pub fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.read().get(&casefold(name)).cloned()
    }

    /// Snapshot of all live channels.
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.channels.read().values().cloned().collect()
    }

    /// Reaps the channel if its member set is empty, marking it defunct so a
    /// concurrent join cannot resurrect it. Directory lock before Channel
    /// lock, per the global ordering.
    pub fn remove_channel_if_empty(&self, channel: &Arc<Channel>) {
        let mut channels = self.channels.write();
        if channel.mark_defunct_if_empty() {
            channels.remove(channel.folded_name());
        }
    }
}

/// The requested nickname is held by somebody else.
#[derive(Debug, Eq, PartialEq)]
pub struct NickInUse;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;

    fn test_client(n: u16) -> Arc<Client> {
        Arc::new(Client::detached(([127, 0, 0, 1], n).into()))
    }

    #[test]
    fn nick_claims_are_exclusive() {
        let directory = Directory::new();
        let a = test_client(1);
        let b = test_client(2);

        assert!(directory.add_nick("alice", &a).is_ok());
        assert_eq!(directory.add_nick("alice", &b), Err(NickInUse));
        // folded collision counts too
        assert_eq!(directory.add_nick("ALICE", &b), Err(NickInUse));
        // re-claiming your own nick is fine
        assert!(directory.add_nick("alice", &a).is_ok());
    }

    #[test]
    fn update_nick_is_atomic() {
        let directory = Directory::new();
        let a = test_client(1);
        let b = test_client(2);
        directory.add_nick("alice", &a).unwrap();
        directory.add_nick("bob", &b).unwrap();

        // collision leaves both entries untouched
        assert_eq!(directory.update_nick("alice", "BOB", &a), Err(NickInUse));
        assert!(Arc::ptr_eq(&directory.client_by_nick("alice").unwrap(), &a));
        assert!(Arc::ptr_eq(&directory.client_by_nick("bob").unwrap(), &b));

        directory.update_nick("alice", "carol", &a).unwrap();
        assert!(directory.client_by_nick("alice").is_none());
        assert!(Arc::ptr_eq(&directory.client_by_nick("carol").unwrap(), &a));
    }

    #[test]
    fn lookups_fold_case() {
        let directory = Directory::new();
        let a = test_client(1);
        directory.add_nick("Nick[1]", &a).unwrap();
        assert!(directory.client_by_nick("nick{1}").is_some());
    }

    #[test]
    fn channel_create_is_idempotent_and_folds_case() {
        let directory = Directory::new();
        let chan = directory.channel_or_create("#Test");
        assert!(Arc::ptr_eq(&directory.channel_or_create("#TEST"), &chan));
        assert!(Arc::ptr_eq(&directory.channel("#test").unwrap(), &chan));
    }

    #[test]
    fn empty_channel_is_reaped_and_marked_defunct() {
        let directory = Directory::new();
        let chan = directory.channel_or_create("#fleeting");
        directory.remove_channel_if_empty(&chan);
        assert!(directory.channel("#fleeting").is_none());
        assert!(chan.is_defunct());
    }
}
