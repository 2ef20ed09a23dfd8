use std::fmt;

use time::OffsetDateTime;

use crate::casemap;

/// A stable handle to a user entity in the session's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub(crate) usize);

/// This struct contains details about a user, such as its nickname, username, hostname and
/// whether it's known to be away.
///
/// Two users are equal when their nicknames are equal under IRC case mapping.
#[derive(Debug, Clone)]
pub struct User {
    // The users nickname
    nick: String,
    // The users username
    username: Option<String>,
    // The users hostname
    host: Option<String>,
    // The users real name, as reported by WHOIS or WHO
    realname: Option<String>,
    // Whether the user is known to be away
    away: bool,
    // The point in time the user went idle, as reported by WHOIS
    idle_since: Option<OffsetDateTime>,
}

impl User {
    /// Creates a user with the given nickname and no further details.
    pub fn new<S: Into<String>>(nick: S) -> User {
        User {
            nick: nick.into(),
            username: None,
            host: None,
            realname: None,
            away: false,
            idle_since: None,
        }
    }

    /// Returns a copy of this user carrying the nickname `nick` and every other detail.
    #[must_use]
    pub fn renamed<S: Into<String>>(&self, nick: S) -> User {
        User {
            nick: nick.into(),
            ..self.clone()
        }
    }

    /// Returns the users nickname
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Returns the users username, if known
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the users hostname, if known
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the users real name, if known
    pub fn realname(&self) -> Option<&str> {
        self.realname.as_deref()
    }

    /// Returns whether the user is known to be away
    pub fn is_away(&self) -> bool {
        self.away
    }

    /// Returns the point in time the user went idle, if known
    pub fn idle_since(&self) -> Option<OffsetDateTime> {
        self.idle_since
    }

    /// Replaces the username and hostname.
    pub fn update(&mut self, username: impl Into<String>, host: impl Into<String>) {
        self.username = Some(username.into());
        self.host = Some(host.into());
    }

    pub(crate) fn set_realname(&mut self, realname: impl Into<String>) {
        self.realname = Some(realname.into());
    }

    pub(crate) fn set_away(&mut self, away: bool) {
        self.away = away;
    }

    pub(crate) fn set_idle_since(&mut self, idle_since: Option<OffsetDateTime>) {
        self.idle_since = idle_since;
    }

    /// Fills in the username and hostname from `mask` where they are still unknown.
    pub(crate) fn merge_hostmask(&mut self, mask: &Hostmask) {
        if self.username.is_none() {
            self.username.clone_from(&mask.user);
        }

        if self.host.is_none() {
            self.host.clone_from(&mask.host);
        }
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        casemap::eq(&self.nick, &other.nick)
    }
}

impl Eq for User {}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nick)
    }
}

/// A message source in the form `nick[!user][@host]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hostmask {
    /// The nickname
    pub nick: String,
    /// The username, if present
    pub user: Option<String>,
    /// The hostname, if present
    pub host: Option<String>,
}

impl Hostmask {
    /// Creates a hostmask that carries only a nickname.
    pub fn new<S: Into<String>>(nick: S) -> Hostmask {
        Hostmask {
            nick: nick.into(),
            user: None,
            host: None,
        }
    }

    /// Splits `mask` into its parts. Anything without `!` or `@` is a bare nickname.
    #[must_use]
    pub fn parse(mask: &str) -> Hostmask {
        let (rest, host) = match mask.split_once('@') {
            Some((rest, host)) => (rest, non_empty(host)),
            None => (mask, None),
        };
        let (nick, user) = match rest.split_once('!') {
            Some((nick, user)) => (nick, non_empty(user)),
            None => (rest, None),
        };

        Hostmask {
            nick: nick.to_string(),
            user,
            host,
        }
    }
}

impl fmt::Display for Hostmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nick)?;

        if let Some(user) = &self.user {
            write!(f, "!{user}")?;
        }

        if let Some(host) = &self.host {
            write!(f, "@{host}")?;
        }

        Ok(())
    }
}

impl From<&str> for Hostmask {
    fn from(mask: &str) -> Self {
        Hostmask::parse(mask)
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
