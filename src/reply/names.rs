use irc::proto::Response;
use tracing::{trace, warn};

use super::{Correlators, Flow, Key, Sequence, known_channel};
use crate::raw::Reply;
use crate::session::State;
use crate::{ChannelId, ChannelUser, Event, Status};

/// Membership prefixes that are recognized but not tracked.
const IGNORED_PREFIXES: [char; 3] = ['~', '&', '%'];

struct Names {
    channel: ChannelId,
    users: Vec<ChannelUser>,
}

/// The channel of a `RPL_NAMREPLY` is its last middle parameter, after an optional visibility
/// symbol.
fn channel_name(reply: &Reply) -> Option<&str> {
    reply.params().last()
}

pub(super) fn start(correlators: &mut Correlators, state: &mut State, reply: &Reply) {
    let Some(name) = channel_name(reply) else {
        warn!(value = %reply.value, "names reply without a channel");
        return;
    };

    let channel = state.registry.resolve_channel(name);
    let key = Key::Names(channel);

    if correlators.is_in_flight(key) {
        trace!(%name, "names already in flight");
        return;
    }

    let mut names = Names {
        channel,
        users: vec![],
    };

    names.accumulate(state, reply);

    correlators.register(Sequence::new("names", Some(key), names, decide, finalize));
}

fn decide(names: &mut Names, state: &mut State, reply: &Reply) -> Flow {
    match reply.response() {
        Some(Response::RPL_NAMREPLY)
            if channel_name(reply).and_then(|name| state.registry.find_channel(name))
                == Some(names.channel) =>
        {
            names.accumulate(state, reply);

            Flow::Continue
        }
        Some(Response::RPL_ENDOFNAMES) if known_channel(state, reply, 0) == Some(names.channel) => {
            Flow::Complete
        }
        _ => Flow::Continue,
    }
}

fn finalize(names: Names, state: &mut State) {
    let channel = state.registry.channel(names.channel).name().to_string();
    let scope = state.channel_scope(names.channel);

    state.emit(
        scope,
        Event::Names {
            channel,
            users: names.users,
        },
    );
}

impl Names {
    fn accumulate(&mut self, state: &mut State, reply: &Reply) {
        for token in reply.text().split_whitespace() {
            let (status, nick) = split_prefixes(token);

            if nick.is_empty() {
                continue;
            }

            let user = state.registry.resolve_user(nick);

            state.reconcile_member(self.channel, user, status);
            self.users.push(state.channel_user(self.channel, user, status));
        }
    }
}

/// Strips the membership prefixes off a name token, returning the tracked status they denote.
fn split_prefixes(token: &str) -> (Status, &str) {
    let nick = token.trim_start_matches(|c: char| {
        Status::from_prefix(c).is_some() || IGNORED_PREFIXES.contains(&c)
    });
    let status = token[..token.len() - nick.len()]
        .chars()
        .filter_map(Status::from_prefix)
        .fold(Status::NONE, |status, flag| status | flag);

    (status, nick)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::listener::Scope;
    use crate::reply::trigger;

    fn handle(correlators: &mut Correlators, state: &mut State, reply: Reply) {
        correlators.offer(state, &reply);
        trigger(correlators, state, &reply);
    }

    #[rstest]
    #[case("alice", Status::NONE, "alice")]
    #[case("@alice", Status::OPERATOR, "alice")]
    #[case("+alice", Status::VOICED, "alice")]
    #[case("@+alice", Status::OPERATOR | Status::VOICED, "alice")]
    #[case("~@alice", Status::OPERATOR, "alice")]
    #[case("%alice", Status::NONE, "alice")]
    fn it_should_split_prefixes(
        #[case] token: &str,
        #[case] status: Status,
        #[case] nick: &str,
    ) {
        assert_eq!(split_prefixes(token), (status, nick));
    }

    #[test]
    fn it_should_fire_once_with_every_line() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(353, "zeta = #rust", Some("@alice +bob")),
        );
        handle(
            &mut correlators,
            &mut state,
            Reply::new(353, "zeta = #rust", Some("carol")),
        );
        assert!(state.queue.is_empty());

        handle(
            &mut correlators,
            &mut state,
            Reply::new(366, "zeta #rust", Some("End of /NAMES list.")),
        );

        let [(scope, Event::Names { channel, users })] = state.queue.as_slice() else {
            panic!("expected a single names event, got {:?}", state.queue);
        };

        assert_eq!(*scope, Scope::Session);
        assert_eq!(channel, "#rust");
        assert_eq!(
            users
                .iter()
                .map(|u| (u.user.nick(), u.status))
                .collect::<Vec<_>>(),
            vec![
                ("alice", Status::OPERATOR),
                ("bob", Status::VOICED),
                ("carol", Status::NONE)
            ]
        );
    }

    #[test]
    fn it_should_ignore_lines_for_other_channels() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(353, "zeta = #rust", Some("alice")),
        );
        handle(
            &mut correlators,
            &mut state,
            Reply::new(353, "zeta = #zeta", Some("bob")),
        );
        handle(
            &mut correlators,
            &mut state,
            Reply::new(366, "zeta #zeta", Some("End of /NAMES list.")),
        );
        handle(
            &mut correlators,
            &mut state,
            Reply::new(366, "zeta #rust", Some("End of /NAMES list.")),
        );

        let channels = state
            .queue
            .iter()
            .map(|(_, event)| match event {
                Event::Names { channel, users } => (channel.as_str(), users.len()),
                event => panic!("unexpected event {event:?}"),
            })
            .collect::<Vec<_>>();

        assert_eq!(channels, vec![("#zeta", 1), ("#rust", 1)]);
    }
}
