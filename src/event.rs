//! Domain events produced by a session.
use irc::proto::{ChannelMode, Mode};
use time::OffsetDateTime;

use crate::{ChannelUser, Topic, User};

/// How a user came to enter or leave a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipationKind {
    /// `JOIN`
    Join,
    /// `PART`
    Part,
    /// `KICK`
    Kick,
    /// `QUIT`
    Quit,
}

/// A user entering or leaving a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participation {
    /// The channel name
    pub channel: String,
    /// The user who joined or left
    pub user: User,
    /// How it happened
    pub kind: ParticipationKind,
    /// The part, kick or quit message
    pub message: Option<String>,
    /// The user who did the kicking
    pub actor: Option<User>,
}

/// The recipient of a notice or private message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Sent to a channel
    Channel(String),
    /// Sent directly to a user
    User(User),
}

/// A notice or private message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Who sent it
    pub sender: User,
    /// Who it was sent to
    pub target: Target,
    /// The text
    pub text: String,
}

/// The assembled result of a WHOIS query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whois {
    /// The user, with details as updated by this reply
    pub user: User,
    /// The user's real name
    pub realname: Option<String>,
    /// The account the user is logged in as
    pub account: Option<String>,
    /// The server the user is connected to
    pub server: Option<String>,
    /// The server's description
    pub server_info: Option<String>,
    /// Whether the user is an IRC operator
    pub operator: bool,
    /// Whether the server reported idle time
    pub idle: bool,
    /// When the user went idle
    pub idle_since: Option<OffsetDateTime>,
    /// The user's away message
    pub away_message: Option<String>,
    /// The channels the user is in, with their status prefixes
    pub channels: Vec<String>,
}

/// Everything a session tells its listeners about.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Registration with the server completed
    ConnectionEstablished,
    /// The connection was lost
    ConnectionLost,
    /// The server sent `ERROR`
    Error {
        /// The error message
        message: String,
    },
    /// Someone was invited to a channel
    Invitation {
        /// The channel name
        channel: String,
        /// Who sent the invitation
        inviter: User,
        /// Who was invited
        invitee: User,
    },
    /// The server sent `PING`
    Ping {
        /// The token to answer with
        token: String,
    },
    /// A user mode changed
    UserMode {
        /// Who changed it
        actor: User,
        /// Whose mode changed
        target: User,
        /// The mode string
        modes: String,
    },
    /// The server rejected something
    NumericError {
        /// The numeric code
        code: u16,
        /// The error text
        message: Option<String>,
    },
    /// Any numeric reply, correlated or not
    NumericReply {
        /// The numeric code
        code: u16,
        /// The middle parameters
        value: String,
        /// The trailing parameter
        message: Option<String>,
    },
    /// A channel topic was received or changed
    Topic(Topic),
    /// A complete NAMES reply
    Names {
        /// The channel name
        channel: String,
        /// Every member listed
        users: Vec<ChannelUser>,
    },
    /// A complete WHO reply
    Who {
        /// The channel name
        channel: String,
        /// Every member listed
        users: Vec<ChannelUser>,
    },
    /// A complete ban list
    Banlist {
        /// The channel name
        channel: String,
        /// The ban masks
        ban_ids: Vec<String>,
    },
    /// The message of the day
    Motd {
        /// The lines of the message
        lines: Vec<String>,
    },
    /// A complete WHOIS reply
    Whois(Box<Whois>),
    /// A member of a channel changed nickname
    NickChanged {
        /// The channel name
        channel: String,
        /// The superseded user
        old: User,
        /// The user carrying the new nickname
        new: User,
    },
    /// We joined a channel
    ChannelJoined(Participation),
    /// We left a channel
    ChannelLeft(Participation),
    /// Someone else joined a channel
    UserJoined(Participation),
    /// Someone else left a channel
    UserLeft(Participation),
    /// A member's status changed
    UserStatusChanged(ChannelUser),
    /// A channel's modes changed
    ChannelMode {
        /// The channel name
        channel: String,
        /// Who changed them
        actor: User,
        /// The changes, including the ones that don't affect membership
        modes: Vec<Mode<ChannelMode>>,
    },
    /// A `NOTICE` was received
    Notice(Message),
    /// A `PRIVMSG` was received
    Privmsg(Message),
    /// A line the session doesn't understand
    Unexpected {
        /// The message prefix
        prefix: Option<String>,
        /// The command
        command: String,
        /// The middle parameters
        middle: String,
        /// The trailing parameter
        trailing: Option<String>,
    },
}
