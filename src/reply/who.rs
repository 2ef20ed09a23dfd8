use irc::proto::Response;
use tracing::{trace, warn};

use super::{Correlators, Flow, Key, Sequence, known_channel};
use crate::raw::{Reply, is_channel};
use crate::session::State;
use crate::{ChannelId, ChannelUser, Event, Status, UserId};

struct Who {
    channel: ChannelId,
    users: Vec<ChannelUser>,
}

/// One `RPL_WHOREPLY` line:
/// `<channel> <user> <host> <server> <nick> <H|G>[*][@|+] :<hopcount> <real name>`
struct WhoLine<'a> {
    channel: &'a str,
    username: &'a str,
    host: &'a str,
    nick: &'a str,
    away: bool,
    status: Status,
    realname: Option<&'a str>,
}

impl<'a> WhoLine<'a> {
    fn parse(reply: &'a Reply) -> Option<WhoLine<'a>> {
        let mut params = reply.params();
        let channel = params.next()?;
        let username = params.next()?;
        let host = params.next()?;
        let _server = params.next()?;
        let nick = params.next()?;
        let flags = params.next().unwrap_or_default();

        let realname = reply
            .message
            .as_deref()
            .and_then(|message| message.split_once(' '))
            .map(|(_hops, realname)| realname);

        Some(WhoLine {
            channel,
            username,
            host,
            nick,
            away: flags.starts_with('G'),
            status: flags
                .chars()
                .filter_map(Status::from_prefix)
                .fold(Status::NONE, |status, flag| status | flag),
            realname,
        })
    }

    /// Applies the user details of this line and returns the user.
    fn apply(&self, state: &mut State) -> UserId {
        let id = state.registry.resolve_user(self.nick);
        let user = state.registry.user_mut(id);

        user.update(self.username, self.host);
        user.set_away(self.away);

        if let Some(realname) = self.realname {
            user.set_realname(realname);
        }

        id
    }
}

pub(super) fn start(correlators: &mut Correlators, state: &mut State, reply: &Reply) {
    let Some(line) = WhoLine::parse(reply) else {
        warn!(value = %reply.value, "malformed who reply");
        return;
    };

    if !is_channel(line.channel) {
        // A WHO for a mask rather than a channel; there's no membership to reconcile
        line.apply(state);
        return;
    }

    let channel = state.registry.resolve_channel(line.channel);
    let key = Key::Who(channel);

    if correlators.is_in_flight(key) {
        trace!(channel = %line.channel, "who already in flight");
        return;
    }

    let mut who = Who {
        channel,
        users: vec![],
    };

    who.accumulate(state, &line);

    correlators.register(Sequence::new("who", Some(key), who, decide, finalize));
}

fn decide(who: &mut Who, state: &mut State, reply: &Reply) -> Flow {
    match reply.response() {
        Some(Response::RPL_WHOREPLY) => {
            match WhoLine::parse(reply) {
                Some(line) if state.registry.find_channel(line.channel) == Some(who.channel) => {
                    who.accumulate(state, &line);
                }
                _ => {}
            }

            Flow::Continue
        }
        Some(Response::RPL_ENDOFWHO) => match reply.param(0) {
            // The lines came from a WHO for a nickname or mask, which names no channel listing
            Some(target) if !is_channel(target) => Flow::Abandon,
            _ if known_channel(state, reply, 0) == Some(who.channel) => Flow::Complete,
            _ => Flow::Continue,
        },
        _ => Flow::Continue,
    }
}

fn finalize(who: Who, state: &mut State) {
    let channel = state.registry.channel(who.channel).name().to_string();
    let scope = state.channel_scope(who.channel);

    state.emit(
        scope,
        Event::Who {
            channel,
            users: who.users,
        },
    );
}

impl Who {
    fn accumulate(&mut self, state: &mut State, line: &WhoLine<'_>) {
        let user = line.apply(state);

        state.reconcile_member(self.channel, user, line.status);
        self.users
            .push(state.channel_user(self.channel, user, line.status));
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
    fn it_should_update_user_details() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(
                352,
                "zeta #rust al example.com irc.example.com alice G@",
                Some("0 Alice Liddell"),
            ),
        );
        handle(
            &mut correlators,
            &mut state,
            Reply::new(315, "zeta #rust", Some("End of /WHO list.")),
        );

        let [(_, Event::Who { channel, users })] = state.queue.as_slice() else {
            panic!("expected a single who event, got {:?}", state.queue);
        };

        assert_eq!(channel, "#rust");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].status, Status::OPERATOR);

        let user = &users[0].user;

        assert_eq!(user.nick(), "alice");
        assert_eq!(user.username(), Some("al"));
        assert_eq!(user.host(), Some("example.com"));
        assert_eq!(user.realname(), Some("Alice Liddell"));
        assert!(user.is_away());
    }

    #[test]
    fn it_should_suppress_overlapping_who() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        for nick in ["alice", "bob"] {
            handle(
                &mut correlators,
                &mut state,
                Reply::new(
                    352,
                    format!("zeta #rust u h s {nick} H"),
                    Some("0 real"),
                ),
            );
        }

        assert_eq!(correlators.len(), 1);

        handle(
            &mut correlators,
            &mut state,
            Reply::new(315, "zeta #rust", Some("End of /WHO list.")),
        );

        assert_eq!(state.queue.len(), 1);
        assert_eq!(correlators.len(), 0);
    }

    #[test]
    fn it_should_not_report_a_mask_who_as_a_channel_listing() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(352, "zeta #rust al example.com s alice H", Some("0 Alice")),
        );
        handle(
            &mut correlators,
            &mut state,
            Reply::new(315, "zeta alice", Some("End of /WHO list.")),
        );

        assert!(state.queue.is_empty());
        assert_eq!(correlators.len(), 0);

        let rust = state.registry.find_channel("#rust").expect("#rust is known");

        assert!(!correlators.is_in_flight(Key::Who(rust)));

        handle(
            &mut correlators,
            &mut state,
            Reply::new(352, "zeta #rust bo example.com s bob H", Some("0 Bob")),
        );
        handle(
            &mut correlators,
            &mut state,
            Reply::new(315, "zeta #rust", Some("End of /WHO list.")),
        );

        let [(_, Event::Who { channel, users })] = state.queue.as_slice() else {
            panic!("expected a single who event, got {:?}", state.queue);
        };

        let nicks: Vec<&str> = users.iter().map(|u| u.user.nick()).collect();

        assert_eq!(channel, "#rust");
        assert_eq!(nicks, vec!["bob"]);
    }
}
