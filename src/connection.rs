//! The outbound side of a session.
use irc::client::Client;
use irc::proto::{ChannelMode, Command, Mode};

use crate::Error;

/// A command the session asks the connection to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Try another nickname
    ChangeNickname(String),
    /// Ask for a channel's modes
    QueryChannelModes(String),
    /// Ask for a channel's ban list
    QueryBanList(String),
    /// Give up on the connection
    Disconnect,
}

/// Something that can deliver a session's requests to the server.
pub trait Connection {
    /// Sends `request` to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be sent.
    fn send(&mut self, request: Request) -> Result<(), Error>;
}

impl From<Request> for Command {
    fn from(request: Request) -> Self {
        match request {
            Request::ChangeNickname(nick) => Command::NICK(nick),
            Request::QueryChannelModes(channel) => Command::ChannelMODE(channel, vec![]),
            Request::QueryBanList(channel) => {
                Command::ChannelMODE(channel, vec![Mode::Plus(ChannelMode::Ban, None)])
            }
            Request::Disconnect => Command::QUIT(None),
        }
    }
}

impl Connection for Client {
    fn send(&mut self, request: Request) -> Result<(), Error> {
        Client::send(self, Command::from(request))?;

        Ok(())
    }
}

/// Collects requests instead of sending them anywhere.
impl Connection for Vec<Request> {
    fn send(&mut self, request: Request) -> Result<(), Error> {
        self.push(request);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_query_the_ban_list_with_a_bare_ban_mode() {
        let command = Command::from(Request::QueryBanList("#rust".to_string()));

        assert_eq!(
            command,
            Command::ChannelMODE(
                "#rust".to_string(),
                vec![Mode::Plus(ChannelMode::Ban, None)]
            )
        );
    }

    #[test]
    fn it_should_record_requests() {
        let mut requests = vec![];

        requests
            .send(Request::ChangeNickname("zeta_".to_string()))
            .expect("recording never fails");

        assert_eq!(requests, vec![Request::ChangeNickname("zeta_".to_string())]);
    }
}
