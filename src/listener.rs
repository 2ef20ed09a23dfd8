use std::collections::HashMap;

use tracing::{debug, info};

use crate::{ChannelId, Event};

/// Where an event is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The session's general listeners
    Session,
    /// The listeners registered on a single channel
    Channel(ChannelId),
}

/// The base trait that all event listeners must implement.
///
/// Closures taking an `&Event` are listeners too.
pub trait Listener {
    /// Process an event.
    fn handle_event(&mut self, event: &Event);
}

impl<F> Listener for F
where
    F: FnMut(&Event),
{
    fn handle_event(&mut self, event: &Event) {
        self(event);
    }
}

/// Logs every event it receives.
#[derive(Debug, Default)]
pub struct LogListener;

impl Listener for LogListener {
    fn handle_event(&mut self, event: &Event) {
        match event {
            Event::NumericReply { code, .. } => debug!(%code, "numeric reply"),
            Event::Ping { .. } => debug!(?event, "received event"),
            event => info!(?event, "received event"),
        }
    }
}

/// Listener registry, one list for the session and one per channel.
#[derive(Default)]
pub struct Registry {
    /// Listeners for session-wide events.
    session: Vec<Box<dyn Listener>>,
    /// Listeners for events about a single channel.
    channels: HashMap<ChannelId, Vec<Box<dyn Listener>>>,
}

impl Registry {
    /// Constructs and returns a new, empty listener registry.
    #[must_use]
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Registers a listener in the given scope.
    pub fn register<L: Listener + 'static>(&mut self, scope: Scope, listener: L) {
        let listener = Box::new(listener);

        match scope {
            Scope::Session => self.session.push(listener),
            Scope::Channel(channel) => self.channels.entry(channel).or_default().push(listener),
        }
    }

    /// Hands `event` to every listener in `scope`, in registration order.
    pub fn fire(&mut self, scope: Scope, event: &Event) {
        let listeners = match scope {
            Scope::Session => Some(&mut self.session),
            Scope::Channel(channel) => self.channels.get_mut(&channel),
        };

        for listener in listeners.into_iter().flatten() {
            listener.handle_event(event);
        }
    }

    /// Returns the number of listeners in `scope`.
    #[must_use]
    pub fn len(&self, scope: Scope) -> usize {
        match scope {
            Scope::Session => self.session.len(),
            Scope::Channel(channel) => self.channels.get(&channel).map_or(0, Vec::len),
        }
    }
}
