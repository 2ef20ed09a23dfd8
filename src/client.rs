//! Drives a session over a live connection.
use futures::stream::{Stream, StreamExt};
use irc::client::Client;
use irc::proto::{Message, Response};
use tracing::{debug, info, trace};

use crate::listener::LogListener;
use crate::raw::{self, RawEvent};
use crate::{Config, Connection, Error, Session};

/// Connects to the configured server and feeds every received message to a session until the
/// connection closes.
///
/// # Errors
///
/// This function will return an error in the following situations:
///
/// - [`Error::IrcClient`] - if the instantiation of the IRC client fails (e.g. due to
///   configuration issues.)
/// - [`Error::IrcRegistration`] - if sending the registration details fails.
/// - [`Error::Irc`] - if a protocol or communication error occurred.
pub async fn run(config: &Config) -> Result<(), Error> {
    let mut client = Client::from_config(config.irc.clone().into())
        .await
        .map_err(Error::IrcClient)?;

    client.identify().map_err(Error::IrcRegistration)?;

    let mut stream = client.stream()?;
    let mut session = Session::new(&config.session, config.irc.nickname.as_str(), client);

    session.add_listener(LogListener);

    let result = drive(&mut session, &mut stream).await;

    trace!(?result, "message stream ended");
    info!("connection closed");

    session.handle(RawEvent::Disconnected);

    result
}

/// Feeds every message of `stream` to `session` until the stream ends.
///
/// # Errors
///
/// Returns [`Error::Irc`] on the first protocol or communication error, except for a rejected
/// nickname, which is handed to the session's nickname recovery.
pub async fn drive<C, S>(session: &mut Session<C>, stream: &mut S) -> Result<(), Error>
where
    C: Connection,
    S: Stream<Item = Result<Message, irc::error::Error>> + Unpin,
{
    while let Some(item) = stream.next().await {
        match item {
            Ok(message) => {
                debug!(?message, "processing irc message");

                for event in raw::from_message(&message) {
                    session.handle(event);
                }
            }
            // The client has no alternative nicknames, so it consumes the rejection and reports
            // this in its place.
            Err(irc::error::Error::NoUsableNick) => {
                debug!("nickname rejected by the server");

                session.handle(RawEvent::NumericError {
                    code: Response::ERR_NICKNAMEINUSE as u16,
                    message: None,
                });
            }
            Err(err) => return Err(Error::Irc(err)),
        }
    }

    Ok(())
}
