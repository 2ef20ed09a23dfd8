use time::OffsetDateTime;
use tracing::warn;

use super::{Correlators, Flow, Sequence, known_channel};
use crate::raw::Reply;
use crate::session::State;
use crate::{ChannelId, Event, Topic, User};

/// `RPL_TOPICWHOTIME`, `<channel> <setter> <timestamp>`
const RPL_TOPICWHOTIME: u16 = 333;

#[derive(Debug)]
struct PendingTopic {
    channel: ChannelId,
    message: Option<String>,
    setter: Option<User>,
    set_at: Option<OffsetDateTime>,
}

/// Starts waiting for the setter of the topic in `RPL_TOPIC`.
pub(super) fn start(correlators: &mut Correlators, state: &mut State, reply: &Reply) {
    let Some(name) = reply.param(0) else {
        warn!(value = %reply.value, "topic reply without a channel");
        return;
    };

    let topic = PendingTopic {
        channel: state.registry.resolve_channel(name),
        message: reply.message.clone(),
        setter: None,
        set_at: None,
    };

    correlators.register(Sequence::new("topic", None, topic, decide, finalize));
}

/// Publishes an empty topic for `RPL_NOTOPIC` right away.
pub(super) fn no_topic(state: &mut State, reply: &Reply) {
    let Some(name) = reply.param(0) else {
        warn!(value = %reply.value, "no-topic reply without a channel");
        return;
    };

    let topic = PendingTopic {
        channel: state.registry.resolve_channel(name),
        message: None,
        setter: None,
        set_at: None,
    };

    finalize(topic, state);
}

/// Completes on the very next reply, taking the setter from it if it's the matching
/// `RPL_TOPICWHOTIME`.
fn decide(topic: &mut PendingTopic, state: &mut State, reply: &Reply) -> Flow {
    if reply.code == RPL_TOPICWHOTIME && known_channel(state, reply, 0) == Some(topic.channel) {
        topic.setter = reply
            .param(1)
            .map(|setter| state.registry.resolve_user(setter))
            .map(|id| state.registry.user(id).clone());

        let timestamp = reply.param(2).or(reply.message.as_deref());
        topic.set_at = timestamp
            .and_then(|ts| ts.trim().parse::<i64>().ok())
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok());

        if topic.set_at.is_none() {
            warn!(?timestamp, "could not parse topic timestamp");
        }
    }

    Flow::Complete
}

fn finalize(pending: PendingTopic, state: &mut State) {
    let channel = state.registry.channel_mut(pending.channel);
    let topic = Topic::new(
        channel.name(),
        pending.message.as_deref(),
        pending.setter,
        pending.set_at,
    );

    channel.set_topic(topic.clone());

    let scope = state.channel_scope(pending.channel);
    state.emit(scope, Event::Topic(topic));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::Scope;
    use crate::reply::trigger;

    fn handle(correlators: &mut Correlators, state: &mut State, reply: Reply) {
        correlators.offer(state, &reply);
        trigger(correlators, state, &reply);
    }

    #[test]
    fn it_should_attach_the_setter_from_topicwhotime() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(332, "zeta #rust", Some("Welcome to #rust")),
        );
        assert!(state.queue.is_empty());

        handle(
            &mut correlators,
            &mut state,
            Reply::new(333, "zeta #rust alice!al@example.com 1700000000", None),
        );

        let [(scope, Event::Topic(topic))] = state.queue.as_slice() else {
            panic!("expected a single topic event, got {:?}", state.queue);
        };

        assert_eq!(*scope, Scope::Session);
        assert_eq!(topic.channel, "#rust");
        assert_eq!(topic.message.as_deref(), Some("Welcome to #rust"));
        assert_eq!(topic.setter.as_ref().map(User::nick), Some("alice"));
        assert_eq!(topic.set_at.map(OffsetDateTime::unix_timestamp), Some(1_700_000_000));
    }

    #[test]
    fn it_should_complete_without_metadata_on_any_other_reply() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(332, "zeta #rust", Some("hello")),
        );
        handle(
            &mut correlators,
            &mut state,
            Reply::new(366, "zeta #rust", Some("End of /NAMES list.")),
        );

        let [(_, Event::Topic(topic))] = state.queue.as_slice() else {
            panic!("expected a single topic event, got {:?}", state.queue);
        };

        assert_eq!(topic.setter, None);
        assert_eq!(topic.set_at, None);
        assert_eq!(correlators.len(), 0);
    }

    #[test]
    fn it_should_tolerate_malformed_timestamps() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(332, "zeta #rust", Some("hello")),
        );
        handle(
            &mut correlators,
            &mut state,
            Reply::new(333, "zeta #rust alice", Some("yesterday")),
        );

        let [(_, Event::Topic(topic))] = state.queue.as_slice() else {
            panic!("expected a single topic event, got {:?}", state.queue);
        };

        assert_eq!(topic.setter.as_ref().map(User::nick), Some("alice"));
        assert_eq!(topic.set_at, None);
    }

    #[test]
    fn it_should_publish_no_topic_immediately() {
        let mut state = State::new("zeta");
        let mut correlators = Correlators::new();

        handle(
            &mut correlators,
            &mut state,
            Reply::new(331, "zeta #rust", Some("No topic is set")),
        );

        let [(_, Event::Topic(topic))] = state.queue.as_slice() else {
            panic!("expected a single topic event, got {:?}", state.queue);
        };

        assert_eq!(topic.message, None);
        assert_eq!(correlators.len(), 0);
    }
}
