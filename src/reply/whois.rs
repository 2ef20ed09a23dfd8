use irc::proto::Response;
use time::{Duration, OffsetDateTime};
use tracing::{debug, trace, warn};

use super::{Correlators, Flow, Key, Sequence};
use crate::casemap;
use crate::event::Whois;
use crate::listener::Scope;
use crate::raw::Reply;
use crate::session::State;
use crate::{Event, UserId};

/// `RPL_WHOISACCOUNT`, `<nick> <account> :is logged in as`
const RPL_WHOISACCOUNT: u16 = 330;

#[derive(Debug, Default)]
struct PendingWhois {
    /// The nickname the replies are addressed with, fixed when the whois starts
    nick: String,
    user: Option<UserId>,
    username: Option<String>,
    host: Option<String>,
    realname: Option<String>,
    account: Option<String>,
    server: Option<String>,
    server_info: Option<String>,
    operator: bool,
    idle: bool,
    idle_since: Option<OffsetDateTime>,
    away_message: Option<String>,
    channels: Vec<String>,
}

pub(super) fn start(correlators: &mut Correlators, state: &mut State, reply: &Reply) {
    let Some(nick) = reply.param(0) else {
        warn!(value = %reply.value, "whois reply without a nickname");
        return;
    };

    let user = state.registry.resolve_user(nick);
    let key = Key::Whois(user);

    if correlators.is_in_flight(key) {
        trace!(%nick, "whois already in flight");
        return;
    }

    let mut whois = PendingWhois {
        nick: nick.to_string(),
        user: Some(user),
        ..PendingWhois::default()
    };

    whois.accumulate(reply);

    correlators.register(Sequence::new("whois", Some(key), whois, decide, finalize));
}

/// Marks the user of an `RPL_AWAY` that isn't part of a whois as away.
pub(super) fn standalone_away(correlators: &Correlators, state: &mut State, reply: &Reply) {
    let Some(nick) = reply.param(0) else {
        return;
    };

    let user = state.registry.resolve_user(nick);

    if !correlators.is_in_flight(Key::Whois(user)) {
        debug!(%nick, "user is away");

        state.registry.user_mut(user).set_away(true);
    }
}

fn decide(whois: &mut PendingWhois, _: &mut State, reply: &Reply) -> Flow {
    if !reply
        .param(0)
        .is_some_and(|nick| casemap::eq(nick, &whois.nick))
    {
        return Flow::Continue;
    }

    if reply.is(Response::RPL_ENDOFWHOIS) {
        return Flow::Complete;
    }

    whois.accumulate(reply);

    Flow::Continue
}

fn finalize(whois: PendingWhois, state: &mut State) {
    let Some(id) = whois.user else {
        return;
    };

    let user = state.registry.user_mut(id);

    if let (Some(username), Some(host)) = (&whois.username, &whois.host) {
        user.update(username.as_str(), host.as_str());
    }

    if let Some(realname) = &whois.realname {
        user.set_realname(realname.as_str());
    }

    if whois.idle {
        user.set_away(true);
        user.set_idle_since(whois.idle_since);
    }

    if whois.away_message.is_some() {
        user.set_away(true);
    }

    let event = Whois {
        user: user.clone(),
        realname: whois.realname,
        account: whois.account,
        server: whois.server,
        server_info: whois.server_info,
        operator: whois.operator,
        idle: whois.idle,
        idle_since: whois.idle_since,
        away_message: whois.away_message,
        channels: whois.channels,
    };

    state.emit(Scope::Session, Event::Whois(Box::new(event)));
}

impl PendingWhois {
    fn accumulate(&mut self, reply: &Reply) {
        match reply.response() {
            Some(Response::RPL_WHOISUSER) => {
                self.username = reply.param(1).map(str::to_string);
                self.host = reply.param(2).map(str::to_string);
                self.realname.clone_from(&reply.message);
            }
            Some(Response::RPL_WHOISSERVER) => {
                self.server = reply.param(1).map(str::to_string);
                self.server_info.clone_from(&reply.message);
            }
            Some(Response::RPL_WHOISOPERATOR) => self.operator = true,
            Some(Response::RPL_WHOISIDLE) => {
                self.idle = true;
                self.idle_since = reply
                    .param(1)
                    .and_then(|secs| secs.parse::<i64>().ok())
                    .and_then(|secs| OffsetDateTime::now_utc().checked_sub(Duration::seconds(secs)));

                if self.idle_since.is_none() {
                    warn!(value = %reply.value, "could not parse idle time");
                }
            }
            Some(Response::RPL_WHOISCHANNELS) => {
                self.channels
                    .extend(reply.text().split_whitespace().map(str::to_string));
            }
            Some(Response::RPL_AWAY) => self.away_message.clone_from(&reply.message),
            _ if reply.code == RPL_WHOISACCOUNT => {
                self.account = reply.param(1).map(str::to_string);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::trigger;

    fn handle(correlators: &mut Correlators, state: &mut State, reply: Reply) {
        correlators.offer(state, &reply);
        trigger(correlators, state, &reply);
    }

    #[test]
    fn it_should_assemble_a_whois() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();
        let replies = [
            Reply::new(311, "zeta alice al example.com *", Some("Alice Liddell")),
            Reply::new(319, "zeta alice", Some("@#rust +#zeta")),
            Reply::new(312, "zeta alice irc.example.com", Some("Example server")),
            Reply::new(301, "zeta alice", Some("gone fishing")),
            Reply::new(330, "zeta alice alice_account", Some("is logged in as")),
            Reply::new(313, "zeta alice", Some("is an IRC operator")),
            Reply::new(317, "zeta alice 60 1700000000", Some("seconds idle, signon time")),
            Reply::new(318, "zeta alice", Some("End of /WHOIS list.")),
        ];

        for reply in replies {
            handle(&mut correlators, &mut state, reply);
        }

        let [(scope, Event::Whois(whois))] = state.queue.as_slice() else {
            panic!("expected a single whois event, got {:?}", state.queue);
        };

        assert_eq!(*scope, Scope::Session);
        assert_eq!(whois.user.nick(), "alice");
        assert_eq!(whois.user.username(), Some("al"));
        assert_eq!(whois.user.host(), Some("example.com"));
        assert!(whois.user.is_away());
        assert_eq!(whois.realname.as_deref(), Some("Alice Liddell"));
        assert_eq!(whois.account.as_deref(), Some("alice_account"));
        assert_eq!(whois.server.as_deref(), Some("irc.example.com"));
        assert_eq!(whois.server_info.as_deref(), Some("Example server"));
        assert!(whois.operator);
        assert!(whois.idle);
        assert_eq!(whois.away_message.as_deref(), Some("gone fishing"));
        assert_eq!(whois.channels, vec!["@#rust", "+#zeta"]);

        let idle_since = whois.idle_since.expect("idle time was reported");
        let idle_for = OffsetDateTime::now_utc() - idle_since;

        assert!(idle_for >= Duration::seconds(60));
        assert!(idle_for < Duration::seconds(120));
    }

    #[test]
    fn it_should_ignore_replies_about_other_users() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(311, "zeta alice al example.com *", Some("Alice")),
        );
        handle(
            &mut correlators,
            &mut state,
            Reply::new(318, "zeta bob", Some("End of /WHOIS list.")),
        );

        assert!(state.queue.is_empty());
        assert_eq!(correlators.len(), 1);
    }

    #[test]
    fn it_should_complete_after_the_user_changes_nickname() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(311, "zeta alice al example.com *", Some("Alice")),
        );

        let alice = state.registry.find_user("alice").expect("alice is known");

        state.registry.rename_user(alice, "alison");

        handle(
            &mut correlators,
            &mut state,
            Reply::new(318, "zeta Alice", Some("End of /WHOIS list.")),
        );

        let [(_, Event::Whois(whois))] = state.queue.as_slice() else {
            panic!("expected a single whois event, got {:?}", state.queue);
        };

        assert_eq!(whois.user.nick(), "alice");
        assert_eq!(whois.realname.as_deref(), Some("Alice"));
        assert_eq!(correlators.len(), 0);
        assert!(!correlators.is_in_flight(Key::Whois(alice)));
    }

    #[test]
    fn it_should_mark_standalone_away_users() {
        let mut state = State::new("zeta");
        let correlators = Correlators::new();

        standalone_away(
            &correlators,
            &mut state,
            &Reply::new(301, "zeta alice", Some("gone fishing")),
        );

        let alice = state.registry.find_user("alice").expect("alice is known");

        assert!(state.registry.user(alice).is_away());
    }

    #[test]
    fn it_should_leave_idle_since_absent_when_malformed() {
        let mut whois = PendingWhois::default();

        whois.accumulate(&Reply::new(317, "zeta alice soon", Some("seconds idle")));

        assert!(whois.idle);
        assert_eq!(whois.idle_since, None);
    }
}
