use irc::proto::Response;
use tracing::{trace, warn};

use super::{Correlators, Flow, Key, Sequence, known_channel};
use crate::raw::Reply;
use crate::session::State;
use crate::{ChannelId, Event};

struct Banlist {
    channel: ChannelId,
    ban_ids: Vec<String>,
}

/// Returns the ban mask of a `RPL_BANLIST` line, `<channel> <mask> [<setter> <time>]`.
fn ban_id(reply: &Reply) -> Option<&str> {
    reply.param(1).or(reply.message.as_deref())
}

pub(super) fn start(correlators: &mut Correlators, state: &mut State, reply: &Reply) {
    let Some(name) = reply.param(0) else {
        warn!(value = %reply.value, "ban list reply without a channel");
        return;
    };

    let channel = state.registry.resolve_channel(name);
    let key = Key::Banlist(channel);

    if correlators.is_in_flight(key) {
        trace!(%name, "ban list already in flight");
        return;
    }

    let banlist = Banlist {
        channel,
        ban_ids: ban_id(reply).map(str::to_string).into_iter().collect(),
    };

    correlators.register(Sequence::new("banlist", Some(key), banlist, decide, finalize));
}

fn decide(banlist: &mut Banlist, state: &mut State, reply: &Reply) -> Flow {
    if known_channel(state, reply, 0) != Some(banlist.channel) {
        return Flow::Continue;
    }

    match reply.response() {
        Some(Response::RPL_BANLIST) => {
            banlist.ban_ids.extend(ban_id(reply).map(str::to_string));

            Flow::Continue
        }
        Some(Response::RPL_ENDOFBANLIST) => Flow::Complete,
        _ => Flow::Continue,
    }
}

fn finalize(banlist: Banlist, state: &mut State) {
    let channel = state.registry.channel_mut(banlist.channel);
    let name = channel.name().to_string();

    channel.set_ban_ids(banlist.ban_ids.clone());

    let scope = state.channel_scope(banlist.channel);
    state.emit(
        scope,
        Event::Banlist {
            channel: name,
            ban_ids: banlist.ban_ids,
        },
    );
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
    fn it_should_replace_the_stored_ban_list() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(367, "zeta #rust *!*@spam.example op 1700000000", None),
        );
        handle(
            &mut correlators,
            &mut state,
            Reply::new(367, "zeta #rust", Some("troll!*@*")),
        );

        let channel = state.registry.find_channel("#rust").expect("channel is known");
        assert!(state.registry.channel(channel).ban_ids().is_empty());

        handle(
            &mut correlators,
            &mut state,
            Reply::new(368, "zeta #rust", Some("End of channel ban list")),
        );

        assert_eq!(
            state.registry.channel(channel).ban_ids(),
            ["*!*@spam.example", "troll!*@*"]
        );

        let [(_, Event::Banlist { channel, ban_ids })] = state.queue.as_slice() else {
            panic!("expected a single ban list event, got {:?}", state.queue);
        };

        assert_eq!(channel, "#rust");
        assert_eq!(ban_ids.len(), 2);
    }
}
