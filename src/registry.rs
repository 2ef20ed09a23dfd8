//! Resolution of raw nicknames and channel names to stable entities.
use std::collections::HashMap;

use tracing::trace;

use crate::user::Hostmask;
use crate::{Channel, ChannelId, User, UserId, casemap};

/// Owns every user and channel the session has seen, keyed by case-folded name.
///
/// Entities are never removed. A nick change supersedes a user with a new entity, after which
/// the old nickname no longer resolves to the old one.
#[derive(Debug, Default)]
pub struct Registry {
    users: Vec<User>,
    channels: Vec<Channel>,
    user_index: HashMap<String, UserId>,
    channel_index: HashMap<String, ChannelId>,
}

impl Registry {
    /// Constructs and returns a new, empty registry.
    #[must_use]
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Returns the user known by `nick_or_mask`, creating it if it's unseen.
    ///
    /// The argument may be a bare nickname or a full `nick!user@host` mask, in which case any
    /// username and hostname the user doesn't have yet are taken from the mask.
    pub fn resolve_user(&mut self, nick_or_mask: &str) -> UserId {
        self.resolve_hostmask(&Hostmask::parse(nick_or_mask))
    }

    /// Returns the user with the nickname in `mask`, creating it if it's unseen.
    pub fn resolve_hostmask(&mut self, mask: &Hostmask) -> UserId {
        let key = casemap::fold(&mask.nick);

        let id = match self.user_index.get(&key) {
            Some(&id) => id,
            None => {
                let id = UserId(self.users.len());

                trace!(nick = %mask.nick, ?id, "registering user");

                self.users.push(User::new(mask.nick.as_str()));
                self.user_index.insert(key, id);

                id
            }
        };

        self.users[id.0].merge_hostmask(mask);

        id
    }

    /// Returns the channel named `name`, creating it if it's unseen.
    pub fn resolve_channel(&mut self, name: &str) -> ChannelId {
        let key = casemap::fold(name);

        if let Some(&id) = self.channel_index.get(&key) {
            return id;
        }

        let id = ChannelId(self.channels.len());

        trace!(%name, ?id, "registering channel");

        self.channels.push(Channel::new(name));
        self.channel_index.insert(key, id);

        id
    }

    /// Looks up a user by nickname without creating it.
    #[must_use]
    pub fn find_user(&self, nick: &str) -> Option<UserId> {
        self.user_index.get(&casemap::fold(nick)).copied()
    }

    /// Looks up a channel by name without creating it.
    #[must_use]
    pub fn find_channel(&self, name: &str) -> Option<ChannelId> {
        self.channel_index.get(&casemap::fold(name)).copied()
    }

    /// Supersedes the user `old` with a new entity carrying `new_nick` and returns it.
    ///
    /// The old entity stays readable through its handle but is no longer reachable by name.
    /// If `new_nick` already belongs to another entity, that mapping is replaced.
    pub fn rename_user(&mut self, old: UserId, new_nick: &str) -> UserId {
        let user = self.users[old.0].renamed(new_nick);
        let old_key = casemap::fold(self.users[old.0].nick());

        if self.user_index.get(&old_key) == Some(&old) {
            self.user_index.remove(&old_key);
        }

        let id = UserId(self.users.len());

        trace!(from = %self.users[old.0], to = %new_nick, ?id, "renaming user");

        self.users.push(user);
        self.user_index.insert(casemap::fold(new_nick), id);

        id
    }

    /// Returns the user behind `id`.
    #[must_use]
    pub fn user(&self, id: UserId) -> &User {
        &self.users[id.0]
    }

    pub(crate) fn user_mut(&mut self, id: UserId) -> &mut User {
        &mut self.users[id.0]
    }

    /// Returns the channel behind `id`.
    #[must_use]
    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.0]
    }

    pub(crate) fn channel_mut(&mut self, id: ChannelId) -> &mut Channel {
        &mut self.channels[id.0]
    }

    /// Returns the number of users that can currently be resolved by name.
    #[must_use]
    pub fn num_users(&self) -> usize {
        self.user_index.len()
    }

    /// Returns the number of known channels.
    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_resolve_case_variants_to_the_same_user() {
        let mut registry = Registry::new();

        let a = registry.resolve_user("Alice");
        let b = registry.resolve_user("aLiCe");
        let c = registry.resolve_user("alice!al@example.com");

        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(registry.user(a).nick(), "Alice");
        assert_eq!(registry.user(a).host(), Some("example.com"));
        assert_eq!(registry.num_users(), 1);
    }

    #[test]
    fn it_should_not_collide_different_users() {
        let mut registry = Registry::new();

        let a = registry.resolve_user("alice");
        let b = registry.resolve_user("Alice2");

        assert_ne!(a, b);
    }

    #[test]
    fn it_should_resolve_channels_case_insensitively() {
        let mut registry = Registry::new();

        let a = registry.resolve_channel("#Rust");
        let b = registry.resolve_channel("#rust");
        let c = registry.resolve_channel("#zeta");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.channel(a).name(), "#Rust");
        assert_eq!(registry.find_channel("#RUST"), Some(a));
        assert_eq!(registry.find_channel("#nope"), None);
    }

    #[test]
    fn it_should_supersede_renamed_users() {
        let mut registry = Registry::new();

        let old = registry.resolve_user("alice!al@example.com");
        let new = registry.rename_user(old, "Alice2");

        assert_ne!(old, new);
        assert_eq!(registry.find_user("alice"), None);
        assert_eq!(registry.resolve_user("alice2"), new);
        assert_eq!(registry.user(new).host(), Some("example.com"));
        assert_eq!(registry.user(old).nick(), "alice");

        // The old nickname now resolves to a fresh entity
        let fresh = registry.resolve_user("alice");
        assert_ne!(fresh, old);
    }

    #[test]
    fn it_should_rename_to_a_case_variant() {
        let mut registry = Registry::new();

        let old = registry.resolve_user("alice");
        let new = registry.rename_user(old, "ALICE");

        assert_eq!(registry.resolve_user("alice"), new);
        assert_eq!(registry.user(new).nick(), "ALICE");
    }
}
