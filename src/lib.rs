//! Session and state tracking for IRC clients.
//!
//! A [`Session`] consumes the decoded lines received from an IRC server and maintains a model of
//! the channels we're in, the users in them and their privileges. Multi-line replies such as
//! WHOIS and NAMES are correlated into single events, and everything that happens is handed to
//! [`Listener`]s registered on the session or on individual channels.
//!
//! ```no_run
//! use zeta_session::{Event, Request, Session, config::SessionConfig, raw::RawEvent};
//!
//! let mut session = Session::new(&SessionConfig::default(), "zeta", Vec::<Request>::new());
//!
//! session.add_listener(|event: &Event| println!("{event:?}"));
//! session.handle(RawEvent::Registered);
//! ```
pub mod casemap;
pub mod channel;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod listener;
pub mod nick;
pub mod raw;
pub mod registry;
mod reply;
pub mod session;
pub mod tracing;
pub mod user;

pub use channel::{Channel, ChannelId, ChannelUser, Membership, Status, Topic};
pub use config::Config;
pub use connection::{Connection, Request};
pub use error::Error;
pub use event::Event;
pub use listener::{Listener, Scope};
pub use nick::NickGenerator;
pub use registry::Registry;
pub use session::Session;
pub use user::{Hostmask, User, UserId};
