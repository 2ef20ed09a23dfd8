//! The inbound side of a session: one decoded callback per protocol line.
use irc::proto::{ChannelMode, Command, Message, Mode, Prefix, Response};
use tracing::trace;

use crate::user::Hostmask;

/// A numeric reply.
///
/// `value` holds the middle parameters, starting with the nickname the reply is addressed to,
/// and `message` holds the trailing parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The numeric code
    pub code: u16,
    /// The middle parameters, space-separated
    pub value: String,
    /// The trailing parameter
    pub message: Option<String>,
}

impl Reply {
    /// Creates a reply.
    pub fn new(code: u16, value: impl Into<String>, message: Option<&str>) -> Reply {
        Reply {
            code,
            value: value.into(),
            message: message.map(str::to_string),
        }
    }

    /// Returns the known response this reply's code stands for.
    #[must_use]
    pub fn response(&self) -> Option<Response> {
        self.code.to_string().parse().ok()
    }

    /// Returns whether this reply's code is `response`.
    #[must_use]
    pub fn is(&self, response: Response) -> bool {
        self.code == response as u16
    }

    /// Returns the middle parameters, skipping the recipient's own nickname.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.value.split_whitespace().skip(1)
    }

    /// Returns the middle parameter at `index`, not counting the recipient's own nickname.
    #[must_use]
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params().nth(index)
    }

    /// Returns the trailing parameter, or the empty string if there is none.
    #[must_use]
    pub fn text(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

/// One protocol line, already decoded into what it means to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// Registration completed (`RPL_WELCOME`)
    Registered,
    /// The connection is gone
    Disconnected,
    /// A numeric reply
    Reply(Reply),
    /// A numeric error
    NumericError {
        /// The numeric code
        code: u16,
        /// The error text
        message: Option<String>,
    },
    /// `PING`
    Ping {
        /// The token to answer with
        token: String,
    },
    /// `INVITE`
    Invite {
        /// The channel name
        channel: String,
        /// Who sent the invitation
        inviter: Hostmask,
        /// The nickname of who was invited
        invitee: String,
    },
    /// `MODE` on a user
    UserMode {
        /// Who changed the mode
        actor: Hostmask,
        /// The nickname of the user whose mode changed
        target: String,
        /// The mode string
        modes: String,
    },
    /// `NICK`
    NickChanged {
        /// The user changing nickname
        user: Hostmask,
        /// The new nickname
        nick: String,
    },
    /// `QUIT`
    Quit {
        /// The user quitting
        user: Hostmask,
        /// The quit message
        message: Option<String>,
    },
    /// `JOIN`
    Join {
        /// The channel name
        channel: String,
        /// The joining user
        user: Hostmask,
    },
    /// `PART`
    Part {
        /// The channel name
        channel: String,
        /// The leaving user
        user: Hostmask,
        /// The part message
        message: Option<String>,
    },
    /// `KICK`
    Kick {
        /// The channel name
        channel: String,
        /// Who did the kicking
        actor: Hostmask,
        /// The nickname of who was kicked
        target: String,
        /// The kick message
        message: Option<String>,
    },
    /// `TOPIC`
    TopicChanged {
        /// The channel name
        channel: String,
        /// Who changed the topic
        actor: Hostmask,
        /// The new topic
        message: Option<String>,
    },
    /// `MODE` on a channel
    ChannelMode {
        /// The channel name
        channel: String,
        /// Who changed the modes
        actor: Hostmask,
        /// The mode changes
        modes: Vec<Mode<ChannelMode>>,
    },
    /// `NOTICE`
    Notice {
        /// The channel name or nickname it was sent to
        target: String,
        /// Who sent it
        sender: Hostmask,
        /// The text
        message: String,
    },
    /// `PRIVMSG`
    Privmsg {
        /// The channel name or nickname it was sent to
        target: String,
        /// Who sent it
        sender: Hostmask,
        /// The text
        message: String,
    },
    /// `ERROR`
    Error {
        /// The error message
        message: String,
    },
    /// Anything else
    Unrecognized {
        /// The message prefix
        prefix: Option<String>,
        /// The command
        command: String,
        /// The middle parameters, space-separated
        middle: String,
        /// The trailing parameter
        trailing: Option<String>,
    },
}

/// Returns whether `target` names a channel rather than a user.
#[must_use]
pub fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

/// Decodes a message from the `irc` crate into the events it represents.
///
/// Most messages map to exactly one event; `JOIN` and `PART` map to one event per channel in
/// their channel list.
#[must_use]
pub fn from_message(message: &Message) -> Vec<RawEvent> {
    let source = source(message);

    let events = match &message.command {
        Command::Response(Response::RPL_WELCOME, _) => vec![RawEvent::Registered],
        Command::Response(response, args) => vec![numeric(*response as u16, args)],
        Command::NICK(nick) => vec![RawEvent::NickChanged {
            user: source,
            nick: nick.clone(),
        }],
        Command::QUIT(reason) => vec![RawEvent::Quit {
            user: source,
            message: reason.clone(),
        }],
        Command::JOIN(channels, _, _) => split_list(channels)
            .map(|channel| RawEvent::Join {
                channel,
                user: source.clone(),
            })
            .collect(),
        Command::PART(channels, reason) => split_list(channels)
            .map(|channel| RawEvent::Part {
                channel,
                user: source.clone(),
                message: reason.clone(),
            })
            .collect(),
        Command::KICK(channel, target, reason) => vec![RawEvent::Kick {
            channel: channel.clone(),
            actor: source,
            target: target.clone(),
            message: reason.clone(),
        }],
        Command::TOPIC(channel, topic) => vec![RawEvent::TopicChanged {
            channel: channel.clone(),
            actor: source,
            message: topic.clone(),
        }],
        Command::ChannelMODE(channel, modes) => vec![RawEvent::ChannelMode {
            channel: channel.clone(),
            actor: source,
            modes: modes.clone(),
        }],
        Command::UserMODE(target, modes) => vec![RawEvent::UserMode {
            actor: source,
            target: target.clone(),
            modes: modes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        }],
        Command::NOTICE(target, text) => vec![RawEvent::Notice {
            target: target.clone(),
            sender: source,
            message: text.clone(),
        }],
        Command::PRIVMSG(target, text) => vec![RawEvent::Privmsg {
            target: target.clone(),
            sender: source,
            message: text.clone(),
        }],
        Command::INVITE(invitee, channel) => vec![RawEvent::Invite {
            channel: channel.clone(),
            inviter: source,
            invitee: invitee.clone(),
        }],
        Command::PING(token, _) => vec![RawEvent::Ping {
            token: token.clone(),
        }],
        Command::ERROR(text) => vec![RawEvent::Error {
            message: text.clone(),
        }],
        Command::Raw(command, args) => match command.parse::<u16>() {
            Ok(code) if command.len() == 3 => vec![numeric(code, args)],
            _ => vec![unrecognized(message, command, args)],
        },
        _ => vec![unrecognized_line(message)],
    };

    trace!(?events, "decoded message");

    events
}

/// Builds a reply or a numeric error from the arguments of a numeric.
fn numeric(code: u16, args: &[String]) -> RawEvent {
    let (message, middle) = match args.split_last() {
        Some((last, middle)) if !middle.is_empty() => (Some(last.clone()), middle.join(" ")),
        Some((last, _)) => (None, last.clone()),
        None => (None, String::new()),
    };

    if (400..600).contains(&code) {
        RawEvent::NumericError { code, message }
    } else {
        RawEvent::Reply(Reply {
            code,
            value: middle,
            message,
        })
    }
}

fn unrecognized(message: &Message, command: &str, args: &[String]) -> RawEvent {
    let (trailing, middle) = match args.split_last() {
        Some((last, middle)) => (Some(last.clone()), middle.join(" ")),
        None => (None, String::new()),
    };

    RawEvent::Unrecognized {
        prefix: message.prefix.as_ref().map(prefix_to_string),
        command: command.to_string(),
        middle,
        trailing,
    }
}

/// Splits a message the `irc` crate understood, but we don't, back into its fragments.
fn unrecognized_line(message: &Message) -> RawEvent {
    let line = message.to_string();
    let line = line.trim_end_matches(['\r', '\n']);
    // Skip tags; the prefix is taken from the parsed message instead
    let line = match line.strip_prefix('@') {
        Some(rest) => rest.split_once(' ').map_or("", |(_, rest)| rest),
        None => line,
    };
    let line = match line.strip_prefix(':') {
        Some(rest) => rest.split_once(' ').map_or("", |(_, rest)| rest),
        None => line,
    };
    let (params, trailing) = match line.split_once(" :") {
        Some((params, trailing)) => (params, Some(trailing.to_string())),
        None => (line, None),
    };
    let (command, middle) = params.split_once(' ').unwrap_or((params, ""));

    RawEvent::Unrecognized {
        prefix: message.prefix.as_ref().map(prefix_to_string),
        command: command.to_string(),
        middle: middle.trim().to_string(),
        trailing,
    }
}

fn source(message: &Message) -> Hostmask {
    match &message.prefix {
        Some(Prefix::Nickname(nick, user, host)) => Hostmask {
            nick: nick.clone(),
            user: (!user.is_empty()).then(|| user.clone()),
            host: (!host.is_empty()).then(|| host.clone()),
        },
        Some(Prefix::ServerName(name)) => Hostmask::new(name.as_str()),
        None => Hostmask::new(""),
    }
}

fn prefix_to_string(prefix: &Prefix) -> String {
    match prefix {
        Prefix::ServerName(name) => name.clone(),
        Prefix::Nickname(nick, user, host) => Hostmask {
            nick: nick.clone(),
            user: (!user.is_empty()).then(|| user.clone()),
            host: (!host.is_empty()).then(|| host.clone()),
        }
        .to_string(),
    }
}

fn split_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}
