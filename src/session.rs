//! The stateful session that turns raw protocol events into domain events.
use indexmap::IndexSet;
use irc::proto::{ChannelMode, Mode, Response};
use time::OffsetDateTime;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::connection::{Connection, Request};
use crate::event::{Message, Participation, ParticipationKind, Target};
use crate::listener::{self, Listener, Scope};
use crate::nick::{AlternativeNicks, NickGenerator};
use crate::raw::{RawEvent, Reply, is_channel};
use crate::reply::{self, Correlators};
use crate::user::Hostmask;
use crate::{Channel, ChannelId, ChannelUser, Event, Registry, Status, Topic, User, UserId, casemap};

/// The state mutated while handling a raw event.
///
/// Events are queued rather than delivered while handling, and handed to listeners once the
/// raw event has been fully applied.
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) registry: Registry,
    /// The channels we're in, in the order we joined them
    pub(crate) joined: IndexSet<ChannelId>,
    /// Our own current nickname
    pub(crate) nickname: String,
    pub(crate) registered: bool,
    pub(crate) queue: Vec<(Scope, Event)>,
}

impl State {
    pub(crate) fn new(nickname: impl Into<String>) -> State {
        State {
            registry: Registry::new(),
            joined: IndexSet::new(),
            nickname: nickname.into(),
            registered: false,
            queue: vec![],
        }
    }

    pub(crate) fn emit(&mut self, scope: Scope, event: Event) {
        trace!(?scope, ?event, "queueing event");

        self.queue.push((scope, event));
    }

    /// Returns the scope for events about `channel`: its own listeners when we're in it,
    /// otherwise the session's.
    pub(crate) fn channel_scope(&self, channel: ChannelId) -> Scope {
        if self.joined.contains(&channel) {
            Scope::Channel(channel)
        } else {
            Scope::Session
        }
    }

    pub(crate) fn is_self(&self, user: UserId) -> bool {
        casemap::eq(self.registry.user(user).nick(), &self.nickname)
    }

    /// Builds a snapshot of `user` in `channel` with `status`.
    pub(crate) fn channel_user(
        &self,
        channel: ChannelId,
        user: UserId,
        status: Status,
    ) -> ChannelUser {
        ChannelUser {
            channel: self.registry.channel(channel).name().to_string(),
            user: self.registry.user(user).clone(),
            status,
        }
    }

    /// Brings the membership of `user` in `channel` in line with `status` as reported by the
    /// server, adding the user if it's missing.
    ///
    /// Only channels we're in have memberships.
    pub(crate) fn reconcile_member(&mut self, channel: ChannelId, user: UserId, status: Status) {
        if !self.joined.contains(&channel) {
            return;
        }

        let entry = self.registry.channel_mut(channel);
        let changed = if let Some(membership) = entry.member_mut(user) {
            membership.set_status(status)
        } else {
            entry.add_member(user, status);
            false
        };

        if changed {
            let snapshot = self.channel_user(channel, user, status);

            self.emit(Scope::Channel(channel), Event::UserStatusChanged(snapshot));
        }
    }

    fn participation(
        &self,
        channel: ChannelId,
        user: UserId,
        kind: ParticipationKind,
        message: Option<String>,
        actor: Option<UserId>,
    ) -> Participation {
        Participation {
            channel: self.registry.channel(channel).name().to_string(),
            user: self.registry.user(user).clone(),
            kind,
            message,
            actor: actor.map(|actor| self.registry.user(actor).clone()),
        }
    }

    /// Removes `channel` from the joined set and forgets its members.
    fn leave(&mut self, channel: ChannelId) {
        debug!(channel = %self.registry.channel(channel).name(), "leaving channel");

        self.joined.shift_remove(&channel);
        self.registry.channel_mut(channel).clear_members();
    }
}

/// An IRC client session.
///
/// Feed it every [`RawEvent`] received from the server, in order, with [`Session::handle`]. It
/// keeps track of the channels we're in and who's in them, correlates multi-line replies and
/// tells its listeners about what happened.
pub struct Session<C> {
    state: State,
    correlators: Correlators,
    listeners: listener::Registry,
    connection: C,
    nick_generator: Box<dyn NickGenerator>,
    request_modes: bool,
}

impl<C: Connection> Session<C> {
    /// Creates a new session for a user with the nickname `nickname`, sending requests over
    /// `connection`.
    pub fn new(config: &SessionConfig, nickname: impl Into<String>, connection: C) -> Session<C> {
        Session {
            state: State::new(nickname),
            correlators: Correlators::new(),
            listeners: listener::Registry::new(),
            connection,
            nick_generator: Box::new(AlternativeNicks::new(config.alt_nicks.iter().cloned())),
            request_modes: config.request_modes,
        }
    }

    /// Replaces the source of alternative nicknames used when the server rejects ours during
    /// registration.
    #[must_use]
    pub fn with_nick_generator<G: NickGenerator + 'static>(mut self, generator: G) -> Self {
        self.nick_generator = Box::new(generator);
        self
    }

    /// Registers a listener for session-wide events.
    pub fn add_listener<L: Listener + 'static>(&mut self, listener: L) {
        self.listeners.register(Scope::Session, listener);
    }

    /// Registers a listener for events about the channel `name` while we're in it.
    pub fn add_channel_listener<L: Listener + 'static>(&mut self, name: &str, listener: L) {
        let channel = self.state.registry.resolve_channel(name);

        self.listeners.register(Scope::Channel(channel), listener);
    }

    /// Returns the user known by `nick`, creating it if it's unseen.
    pub fn resolve_user(&mut self, nick: &str) -> UserId {
        self.state.registry.resolve_user(nick)
    }

    /// Returns the channel named `name`, creating it if it's unseen.
    pub fn resolve_channel(&mut self, name: &str) -> ChannelId {
        self.state.registry.resolve_channel(name)
    }

    /// Returns the user behind `id`.
    #[must_use]
    pub fn user(&self, id: UserId) -> &User {
        self.state.registry.user(id)
    }

    /// Returns the channel behind `id`.
    #[must_use]
    pub fn channel(&self, id: ChannelId) -> &Channel {
        self.state.registry.channel(id)
    }

    /// Returns the entity registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.state.registry
    }

    /// Returns the status of `user` in `channel`, if they're known to be in it.
    #[must_use]
    pub fn status(&self, channel: ChannelId, user: UserId) -> Option<Status> {
        self.channel(channel).member(user).map(|m| m.status())
    }

    /// Returns whether we're in `channel`.
    #[must_use]
    pub fn is_joined(&self, channel: ChannelId) -> bool {
        self.state.joined.contains(&channel)
    }

    /// Returns the channels we're in, in the order we joined them.
    pub fn joined_channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.state.joined.iter().copied()
    }

    /// Returns our current nickname.
    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.state.nickname
    }

    /// Returns whether registration with the server has completed.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.state.registered
    }

    /// Returns the connection.
    #[must_use]
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Returns the connection mutably.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Applies `event` and delivers the resulting events to listeners.
    pub fn handle(&mut self, event: RawEvent) {
        trace!(?event, "handling raw event");

        match event {
            RawEvent::Registered => self.on_registered(),
            RawEvent::Disconnected => self.on_disconnected(),
            RawEvent::Reply(reply) => self.on_reply(reply),
            RawEvent::NumericError { code, message } => self.on_numeric_error(code, message),
            RawEvent::Ping { token } => self.state.emit(Scope::Session, Event::Ping { token }),
            RawEvent::Error { message } => {
                self.state.emit(Scope::Session, Event::Error { message });
            }
            RawEvent::Invite {
                channel,
                inviter,
                invitee,
            } => self.on_invite(channel, &inviter, &invitee),
            RawEvent::UserMode {
                actor,
                target,
                modes,
            } => self.on_user_mode(&actor, &target, modes),
            RawEvent::NickChanged { user, nick } => self.on_nick(&user, &nick),
            RawEvent::Quit { user, message } => self.on_quit(&user, message),
            RawEvent::Join { channel, user } => self.on_join(&channel, &user),
            RawEvent::Part {
                channel,
                user,
                message,
            } => self.on_part(&channel, &user, message),
            RawEvent::Kick {
                channel,
                actor,
                target,
                message,
            } => self.on_kick(&channel, &actor, &target, message),
            RawEvent::TopicChanged {
                channel,
                actor,
                message,
            } => self.on_topic(&channel, &actor, message.as_deref()),
            RawEvent::ChannelMode {
                channel,
                actor,
                modes,
            } => self.on_channel_mode(&channel, &actor, modes),
            RawEvent::Notice {
                target,
                sender,
                message,
            } => {
                let message = self.message(&target, &sender, message);
                self.state.emit(Scope::Session, Event::Notice(message));
            }
            RawEvent::Privmsg {
                target,
                sender,
                message,
            } => {
                let message = self.message(&target, &sender, message);
                self.state.emit(Scope::Session, Event::Privmsg(message));
            }
            RawEvent::Unrecognized {
                prefix,
                command,
                middle,
                trailing,
            } => self.state.emit(
                Scope::Session,
                Event::Unexpected {
                    prefix,
                    command,
                    middle,
                    trailing,
                },
            ),
        }

        self.flush();
    }

    /// Delivers every queued event to the listeners of its scope, in the order they were
    /// produced.
    fn flush(&mut self) {
        for (scope, event) in std::mem::take(&mut self.state.queue) {
            self.listeners.fire(scope, &event);
        }
    }

    fn send(&mut self, request: Request) {
        trace!(?request, "sending request");

        if let Err(err) = self.connection.send(request) {
            warn!(?err, "could not send request");
        }
    }

    fn on_registered(&mut self) {
        info!(nickname = %self.state.nickname, "registered with server");

        self.state.registered = true;
        self.state.emit(Scope::Session, Event::ConnectionEstablished);
    }

    fn on_disconnected(&mut self) {
        info!("disconnected from server");

        self.state.registered = false;

        for channel in std::mem::take(&mut self.state.joined) {
            self.state.registry.channel_mut(channel).clear_members();
        }

        self.correlators.clear();
        self.state.emit(Scope::Session, Event::ConnectionLost);
    }

    fn on_reply(&mut self, reply: Reply) {
        self.correlators.offer(&mut self.state, &reply);
        reply::trigger(&mut self.correlators, &mut self.state, &reply);

        let Reply {
            code,
            value,
            message,
        } = reply;

        self.state
            .emit(Scope::Session, Event::NumericReply { code, value, message });
    }

    fn on_numeric_error(&mut self, code: u16, message: Option<String>) {
        let nick_rejected = [
            Response::ERR_NONICKNAMEGIVEN,
            Response::ERR_ERRONEOUSNICKNAME,
            Response::ERR_NICKNAMEINUSE,
        ]
        .iter()
        .any(|response| *response as u16 == code);

        if nick_rejected && !self.state.registered {
            self.recover_nickname(code);
        } else {
            self.state
                .emit(Scope::Session, Event::NumericError { code, message });
        }
    }

    /// Tries the next alternative nickname, or gives up on the connection when there are none
    /// left.
    fn recover_nickname(&mut self, code: u16) {
        match self.nick_generator.next_nick() {
            Some(nick) => {
                info!(%code, rejected = %self.state.nickname, %nick, "trying alternative nickname");

                self.state.nickname.clone_from(&nick);
                self.send(Request::ChangeNickname(nick));
            }
            None => {
                warn!(%code, rejected = %self.state.nickname, "no alternative nicknames left");

                self.send(Request::Disconnect);
            }
        }
    }

    fn on_invite(&mut self, channel: String, inviter: &Hostmask, invitee: &str) {
        let registry = &mut self.state.registry;
        let inviter = registry.resolve_hostmask(inviter);
        let invitee = registry.resolve_user(invitee);
        let event = Event::Invitation {
            channel,
            inviter: registry.user(inviter).clone(),
            invitee: registry.user(invitee).clone(),
        };

        self.state.emit(Scope::Session, event);
    }

    fn on_user_mode(&mut self, actor: &Hostmask, target: &str, modes: String) {
        let registry = &mut self.state.registry;
        let actor = registry.resolve_hostmask(actor);
        let target = registry.resolve_user(target);
        let event = Event::UserMode {
            actor: registry.user(actor).clone(),
            target: registry.user(target).clone(),
            modes,
        };

        self.state.emit(Scope::Session, event);
    }

    fn on_nick(&mut self, mask: &Hostmask, nick: &str) {
        let old = self.state.registry.resolve_hostmask(mask);
        let is_self = self.state.is_self(old);
        let new = self.state.registry.rename_user(old, nick);

        if is_self {
            info!(from = %mask.nick, to = %nick, "our nickname changed");

            self.state.nickname = nick.to_string();
        }

        let channels: Vec<ChannelId> = self.state.joined.iter().copied().collect();

        for channel in channels {
            if !self
                .state
                .registry
                .channel_mut(channel)
                .replace_member(old, new)
            {
                continue;
            }

            let event = Event::NickChanged {
                channel: self.state.registry.channel(channel).name().to_string(),
                old: self.state.registry.user(old).clone(),
                new: self.state.registry.user(new).clone(),
            };

            self.state.emit(Scope::Channel(channel), event);
        }
    }

    fn on_quit(&mut self, mask: &Hostmask, message: Option<String>) {
        let user = self.state.registry.resolve_hostmask(mask);

        if self.state.is_self(user) {
            let channels: Vec<ChannelId> = self.state.joined.iter().copied().collect();

            for channel in channels {
                let participation = self.state.participation(
                    channel,
                    user,
                    ParticipationKind::Quit,
                    message.clone(),
                    None,
                );

                self.state.leave(channel);
                self.state
                    .emit(Scope::Session, Event::ChannelLeft(participation));
            }

            return;
        }

        let channels: Vec<ChannelId> = self.state.joined.iter().copied().collect();

        for channel in channels {
            if self
                .state
                .registry
                .channel_mut(channel)
                .remove_member(user)
                .is_none()
            {
                continue;
            }

            let participation = self.state.participation(
                channel,
                user,
                ParticipationKind::Quit,
                message.clone(),
                None,
            );

            self.state
                .emit(Scope::Channel(channel), Event::UserLeft(participation));
        }
    }

    fn on_join(&mut self, name: &str, mask: &Hostmask) {
        let channel = self.state.registry.resolve_channel(name);
        let user = self.state.registry.resolve_hostmask(mask);

        if self.state.is_self(user) {
            info!(%name, "joined channel");

            let entry = self.state.registry.channel_mut(channel);

            entry.clear_members();
            entry.add_member(user, Status::NONE);
            self.state.joined.insert(channel);

            let participation =
                self.state
                    .participation(channel, user, ParticipationKind::Join, None, None);
            self.state
                .emit(Scope::Session, Event::ChannelJoined(participation));

            if self.request_modes {
                let name = self.state.registry.channel(channel).name().to_string();

                self.send(Request::QueryChannelModes(name.clone()));
                self.send(Request::QueryBanList(name));
            }

            return;
        }

        if self.state.joined.contains(&channel) {
            self.state
                .registry
                .channel_mut(channel)
                .add_member(user, Status::NONE);
        }

        let participation =
            self.state
                .participation(channel, user, ParticipationKind::Join, None, None);
        let scope = self.state.channel_scope(channel);

        self.state.emit(scope, Event::UserJoined(participation));
    }

    fn on_part(&mut self, name: &str, mask: &Hostmask, message: Option<String>) {
        let channel = self.state.registry.resolve_channel(name);
        let user = self.state.registry.resolve_hostmask(mask);

        self.leave_or_remove(channel, user, ParticipationKind::Part, message, None);
    }

    fn on_kick(&mut self, name: &str, actor: &Hostmask, target: &str, message: Option<String>) {
        let channel = self.state.registry.resolve_channel(name);
        let actor = self.state.registry.resolve_hostmask(actor);
        let target = self.state.registry.resolve_user(target);

        self.leave_or_remove(channel, target, ParticipationKind::Kick, message, Some(actor));
    }

    /// Handles `user` leaving `channel`: we leave the channel if it's us, otherwise the user's
    /// membership is dropped.
    fn leave_or_remove(
        &mut self,
        channel: ChannelId,
        user: UserId,
        kind: ParticipationKind,
        message: Option<String>,
        actor: Option<UserId>,
    ) {
        let participation = self
            .state
            .participation(channel, user, kind, message, actor);

        if self.state.is_self(user) {
            self.state.leave(channel);
            self.state
                .emit(Scope::Session, Event::ChannelLeft(participation));

            return;
        }

        self.state.registry.channel_mut(channel).remove_member(user);

        let scope = self.state.channel_scope(channel);
        self.state.emit(scope, Event::UserLeft(participation));
    }

    fn on_topic(&mut self, name: &str, actor: &Hostmask, message: Option<&str>) {
        let channel = self.state.registry.resolve_channel(name);
        let actor = self.state.registry.resolve_hostmask(actor);
        let topic = Topic::new(
            self.state.registry.channel(channel).name(),
            message,
            Some(self.state.registry.user(actor).clone()),
            Some(OffsetDateTime::now_utc()),
        );

        self.state
            .registry
            .channel_mut(channel)
            .set_topic(topic.clone());

        let scope = self.state.channel_scope(channel);
        self.state.emit(scope, Event::Topic(topic));
    }

    fn on_channel_mode(&mut self, name: &str, actor: &Hostmask, modes: Vec<Mode<ChannelMode>>) {
        let channel = self.state.registry.resolve_channel(name);
        let actor = self.state.registry.resolve_hostmask(actor);
        let scope = self.state.channel_scope(channel);

        let deltas: Vec<(String, Status, bool)> = modes
            .iter()
            .filter_map(|mode| match mode {
                Mode::Plus(ChannelMode::Oper, Some(nick)) => {
                    Some((nick.clone(), Status::OPERATOR, true))
                }
                Mode::Minus(ChannelMode::Oper, Some(nick)) => {
                    Some((nick.clone(), Status::OPERATOR, false))
                }
                Mode::Plus(ChannelMode::Voice, Some(nick)) => {
                    Some((nick.clone(), Status::VOICED, true))
                }
                Mode::Minus(ChannelMode::Voice, Some(nick)) => {
                    Some((nick.clone(), Status::VOICED, false))
                }
                _ => None,
            })
            .collect();

        self.state.emit(
            scope,
            Event::ChannelMode {
                channel: self.state.registry.channel(channel).name().to_string(),
                actor: self.state.registry.user(actor).clone(),
                modes,
            },
        );

        for (nick, flag, grant) in deltas {
            let user = self.state.registry.resolve_user(&nick);
            let Some(membership) = self.state.registry.channel_mut(channel).member_mut(user)
            else {
                debug!(%name, %nick, "mode change for a user that isn't a member");
                continue;
            };

            let changed = if grant {
                membership.add_status(flag)
            } else {
                membership.remove_status(flag)
            };

            if changed {
                let status = membership.status();
                let snapshot = self.state.channel_user(channel, user, status);

                self.state.emit(scope, Event::UserStatusChanged(snapshot));
            }
        }
    }

    fn message(&mut self, target: &str, sender: &Hostmask, text: String) -> Message {
        let registry = &mut self.state.registry;
        let sender = registry.resolve_hostmask(sender);
        let target = if is_channel(target) {
            Target::Channel(target.to_string())
        } else {
            let user = registry.resolve_user(target);
            Target::User(registry.user(user).clone())
        };

        Message {
            sender: registry.user(sender).clone(),
            target,
            text,
        }
    }
}

impl<C> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("correlators", &self.correlators)
            .field("request_modes", &self.request_modes)
            .finish_non_exhaustive()
    }
}
