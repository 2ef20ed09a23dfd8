//! Error types

use miette::Diagnostic;
use thiserror::Error;

/// Errors for configuration loading and the outbound side of a session.
///
/// Inbound dispatch never fails; these only surface from setup code and from [`Connection`]
/// implementations.
///
/// [`Connection`]: crate::Connection
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The configuration could not be extracted from its sources.
    #[error("Could not load configuration")]
    #[diagnostic(code(zeta_session::config))]
    Config(#[source] Box<figment::Error>),
    /// Failed to create the IRC client.
    #[error("Could not create IRC client")]
    #[diagnostic(code(zeta_session::irc_client))]
    IrcClient(#[source] irc::error::Error),
    /// Failed to register with the IRC server.
    #[error("Could not send registration details for IRC")]
    IrcRegistration(#[source] irc::error::Error),
    /// General IRC communication error.
    #[error("IRC error")]
    Irc(#[from] irc::error::Error),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
