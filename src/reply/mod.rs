//! Correlation of multi-line numeric replies into single results.
//!
//! A composite query such as WHOIS or NAMES is answered with a run of numeric replies closed by
//! a terminating reply, and those runs may be interleaved with unrelated traffic. Each run is
//! tracked by a [`Sequence`] that's offered every numeric reply after the one that started it,
//! until its decision function says it's complete. It's then finalized exactly once.
use std::collections::HashSet;
use std::fmt;

use irc::proto::Response;
use tracing::{debug, trace};

use crate::raw::Reply;
use crate::session::State;
use crate::{ChannelId, UserId};

mod banlist;
mod motd;
mod names;
mod topic;
mod who;
mod whois;

/// The result of offering a reply to a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Keep offering replies
    Continue,
    /// The sequence is done and must be finalized
    Complete,
    /// The sequence belongs to a query it can't report on and is dropped unfinalized
    Abandon,
}

/// Identifies a query that can only be answered once at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Key {
    Names(ChannelId),
    Who(ChannelId),
    Whois(UserId),
    Banlist(ChannelId),
    Motd,
}

/// A single in-flight correlation.
pub(crate) struct Sequence<A> {
    /// What kind of reply this is, for logging
    kind: &'static str,
    key: Option<Key>,
    acc: A,
    decide: fn(&mut A, &mut State, &Reply) -> Flow,
    finalize: fn(A, &mut State),
}

impl<A> Sequence<A> {
    pub(crate) fn new(
        kind: &'static str,
        key: Option<Key>,
        acc: A,
        decide: fn(&mut A, &mut State, &Reply) -> Flow,
        finalize: fn(A, &mut State),
    ) -> Sequence<A> {
        Sequence {
            kind,
            key,
            acc,
            decide,
            finalize,
        }
    }
}

/// The object-safe face of a [`Sequence`], so sequences with different accumulators can share
/// a list.
trait Correlation {
    fn kind(&self) -> &'static str;
    fn key(&self) -> Option<Key>;
    fn offer(&mut self, state: &mut State, reply: &Reply) -> Flow;
    fn finalize(self: Box<Self>, state: &mut State);
}

impl<A> Correlation for Sequence<A> {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn key(&self) -> Option<Key> {
        self.key
    }

    fn offer(&mut self, state: &mut State, reply: &Reply) -> Flow {
        (self.decide)(&mut self.acc, state, reply)
    }

    fn finalize(self: Box<Self>, state: &mut State) {
        let Sequence { acc, finalize, .. } = *self;

        finalize(acc, state);
    }
}

/// The active sequences of a session, in registration order, and the keys they hold.
#[derive(Default)]
pub(crate) struct Correlators {
    active: Vec<Box<dyn Correlation>>,
    in_flight: HashSet<Key>,
}

impl Correlators {
    pub(crate) fn new() -> Correlators {
        Correlators::default()
    }

    /// Returns whether a sequence holding `key` is active.
    pub(crate) fn is_in_flight(&self, key: Key) -> bool {
        self.in_flight.contains(&key)
    }

    /// Returns the number of active sequences.
    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    /// Activates `sequence`, claiming its key.
    ///
    /// Callers check [`Correlators::is_in_flight`] before building a keyed sequence.
    pub(crate) fn register<A: 'static>(&mut self, sequence: Sequence<A>) {
        debug!(kind = sequence.kind, key = ?sequence.key, "starting sequence");

        if let Some(key) = sequence.key {
            self.in_flight.insert(key);
        }

        self.active.push(Box::new(sequence));
    }

    /// Offers `reply` to every active sequence in registration order, finalizing the ones it
    /// completes.
    pub(crate) fn offer(&mut self, state: &mut State, reply: &Reply) {
        let mut index = 0;

        while index < self.active.len() {
            match self.active[index].offer(state, reply) {
                Flow::Continue => index += 1,
                Flow::Complete => {
                    let sequence = self.active.remove(index);

                    if let Some(key) = sequence.key() {
                        self.in_flight.remove(&key);
                    }

                    debug!(kind = sequence.kind(), code = reply.code, "completing sequence");

                    sequence.finalize(state);
                }
                Flow::Abandon => {
                    let sequence = self.active.remove(index);

                    if let Some(key) = sequence.key() {
                        self.in_flight.remove(&key);
                    }

                    debug!(kind = sequence.kind(), code = reply.code, "abandoning sequence");
                }
            }
        }
    }

    /// Drops every active sequence without finalizing it and releases their keys.
    pub(crate) fn clear(&mut self) {
        if self.len() > 0 {
            debug!(num_sequences = self.len(), "dropping active sequences");
        }

        self.active.clear();
        self.in_flight.clear();
    }
}

impl fmt::Debug for Correlators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correlators")
            .field(
                "active",
                &self.active.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            )
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

/// Starts a new sequence if `reply` is the first line of one.
///
/// This runs after `reply` has been offered to the already active sequences, so a sequence
/// never sees the reply that started it twice.
pub(crate) fn trigger(correlators: &mut Correlators, state: &mut State, reply: &Reply) {
    let Some(response) = reply.response() else {
        trace!(code = reply.code, "unknown numeric reply");

        return;
    };

    match response {
        Response::RPL_TOPIC => topic::start(correlators, state, reply),
        Response::RPL_NOTOPIC => topic::no_topic(state, reply),
        Response::RPL_NAMREPLY => names::start(correlators, state, reply),
        Response::RPL_WHOREPLY => who::start(correlators, state, reply),
        Response::RPL_WHOISUSER
        | Response::RPL_WHOISSERVER
        | Response::RPL_WHOISOPERATOR
        | Response::RPL_WHOISIDLE
        | Response::RPL_WHOISCHANNELS => whois::start(correlators, state, reply),
        Response::RPL_AWAY => whois::standalone_away(correlators, state, reply),
        Response::RPL_BANLIST => banlist::start(correlators, state, reply),
        Response::RPL_MOTDSTART => motd::start(correlators, state, reply),
        _ => {}
    }
}

/// Returns the channel named by the middle parameter at `index` if it's one we know of.
///
/// Replies for channels that were never resolved can't belong to any sequence.
fn known_channel(state: &State, reply: &Reply, index: usize) -> Option<ChannelId> {
    reply
        .param(index)
        .and_then(|name| state.registry.find_channel(name))
}
