use bitflags::bitflags;
use time::OffsetDateTime;

use crate::{User, UserId};

/// A stable handle to a channel entity in the session's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub(crate) usize);

bitflags! {
    /// The privileges a user holds in a channel. The empty set is an ordinary member.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Status: u8 {
        /// `+v`
        const VOICED = 1 << 0;
        /// `+o`
        const OPERATOR = 1 << 1;
    }
}

impl Status {
    /// An ordinary member without privileges.
    pub const NONE: Status = Status::empty();

    /// Returns the status denoted by a single NAMES/WHO prefix character, if it's one we track.
    #[must_use]
    pub const fn from_prefix(c: char) -> Option<Status> {
        match c {
            '@' => Some(Status::OPERATOR),
            '+' => Some(Status::VOICED),
            _ => None,
        }
    }
}

/// A user's membership in a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    user: UserId,
    status: Status,
}

impl Membership {
    /// Creates a membership for `user` with the given `status`.
    #[must_use]
    pub const fn new(user: UserId, status: Status) -> Membership {
        Membership { user, status }
    }

    /// Returns the member.
    #[must_use]
    pub const fn user(&self) -> UserId {
        self.user
    }

    /// Returns the member's current status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Grants `flag`. Returns whether the status changed.
    pub fn add_status(&mut self, flag: Status) -> bool {
        let old = self.status;
        self.status.insert(flag);
        self.status != old
    }

    /// Revokes `flag`. Returns whether the status changed.
    pub fn remove_status(&mut self, flag: Status) -> bool {
        let old = self.status;
        self.status.remove(flag);
        self.status != old
    }

    /// Replaces the status. Returns whether it changed.
    pub fn set_status(&mut self, status: Status) -> bool {
        let old = self.status;
        self.status = status;
        self.status != old
    }
}

/// A snapshot of a channel membership, as handed to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUser {
    /// The channel name
    pub channel: String,
    /// The member
    pub user: User,
    /// The member's status at the time of the event
    pub status: Status,
}

/// A channel topic.
///
/// `message` is `None` when the channel has no topic, which is distinct from a topic that merely
/// happens to be unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    /// The channel name
    pub channel: String,
    /// The topic text
    pub message: Option<String>,
    /// Who set the topic
    pub setter: Option<User>,
    /// When the topic was set
    pub set_at: Option<OffsetDateTime>,
}

impl Topic {
    /// Creates a topic. A blank `message` means there is no topic.
    pub fn new(
        channel: impl Into<String>,
        message: Option<&str>,
        setter: Option<User>,
        set_at: Option<OffsetDateTime>,
    ) -> Topic {
        Topic {
            channel: channel.into(),
            message: message
                .filter(|message| !message.trim().is_empty())
                .map(str::to_string),
            setter,
            set_at,
        }
    }
}

/// This structure contains details about a channel
#[derive(Debug, Clone, Default)]
pub struct Channel {
    // The channel name
    name: String,
    // The channels current topic
    topic: Option<Topic>,
    // The users known to be present in this channel
    members: Vec<Membership>,
    // The last ban list we've received
    ban_ids: Vec<String>,
}

impl Channel {
    /// Creates a channel with no known members.
    pub fn new<S: Into<String>>(name: S) -> Channel {
        Channel {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the name of the channel
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the topic of the channel, if one has been received
    pub fn topic(&self) -> Option<&Topic> {
        self.topic.as_ref()
    }

    pub(crate) fn set_topic(&mut self, topic: Topic) {
        self.topic = Some(topic);
    }

    /// Returns the last ban list received for the channel
    pub fn ban_ids(&self) -> &[String] {
        &self.ban_ids
    }

    pub(crate) fn set_ban_ids(&mut self, ban_ids: Vec<String>) {
        self.ban_ids = ban_ids;
    }

    /// Returns the memberships currently known for this channel
    pub fn members(&self) -> &[Membership] {
        &self.members
    }

    /// Returns whether `user` is known to be present in this channel
    pub fn has_member(&self, user: UserId) -> bool {
        self.member(user).is_some()
    }

    /// Returns the membership of `user`, if present
    pub fn member(&self, user: UserId) -> Option<&Membership> {
        self.members.iter().find(|m| m.user == user)
    }

    pub(crate) fn member_mut(&mut self, user: UserId) -> Option<&mut Membership> {
        self.members.iter_mut().find(|m| m.user == user)
    }

    /// Adds `user` with `status` unless already present. Returns whether it was added.
    pub(crate) fn add_member(&mut self, user: UserId, status: Status) -> bool {
        if self.has_member(user) {
            return false;
        }

        self.members.push(Membership::new(user, status));

        true
    }

    pub(crate) fn remove_member(&mut self, user: UserId) -> Option<Membership> {
        let index = self.members.iter().position(|m| m.user == user)?;

        Some(self.members.remove(index))
    }

    /// Moves the membership of `old` over to `new`, keeping its status and position.
    pub(crate) fn replace_member(&mut self, old: UserId, new: UserId) -> bool {
        match self.member_mut(old) {
            Some(membership) => {
                membership.user = new;
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear_members(&mut self) {
        self.members.clear();
    }
}
