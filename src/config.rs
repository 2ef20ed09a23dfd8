//! Configuration for the session layer and the bundled client binary.
use std::collections::HashMap;
use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format as _, Toml};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::Error;

/// The prefix used for configuration values read from the environment.
pub const ENV_PREFIX: &str = "ZETA_";

/// The complete configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Session behaviour
    #[serde(default)]
    pub session: SessionConfig,
    /// Tracing configuration
    #[serde(default)]
    pub tracing: TracingConfig,
    /// IRC client configuration
    #[serde(default)]
    pub irc: IrcConfig,
}

impl Config {
    /// Loads the TOML file at `path` and merges any `ZETA_`-prefixed environment variables on top
    /// of it. Nested keys are separated by a double underscore, e.g. `ZETA_IRC__NICKNAME`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the merged sources don't form a valid configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, Error> {
        let path = path.as_ref();

        trace!(?path, "loading config file");

        let config = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        trace!(?path, "successfully loaded config file");

        Ok(config)
    }
}

/// Behaviour of the session state tracker.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Ask the server for the channel modes and the ban list when we join a channel.
    #[serde(default = "default_request_modes")]
    pub request_modes: bool,
    /// Nicknames to try, in order, if the server rejects ours before registration.
    #[serde(default)]
    pub alt_nicks: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            request_modes: default_request_modes(),
            alt_nicks: vec![],
        }
    }
}

/// The output format of the stdout tracing layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// One JSON object per event
    #[default]
    Json,
    /// Multi-line, human-readable output
    Pretty,
    /// Single-line, human-readable output
    Compact,
}

/// Tracing configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TracingConfig {
    /// Format of the log lines written to stdout
    #[serde(default)]
    pub format: Format,
}

/// Per-channel connection settings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct IrcChannelConfig {
    /// The shared key to access the channel.
    pub key: Option<String>,
}

/// TLS settings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct IrcTlsConfig {
    /// Enable TLS.
    pub enabled: bool,
}

/// Server connection settings used by the `zeta-session` binary.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct IrcConfig {
    /// The client's nickname.
    pub nickname: String,
    /// The client's username.
    pub username: Option<String>,
    /// The client's real name.
    pub realname: Option<String>,
    /// The hostname of the server to connect to.
    pub hostname: String,
    /// The password to connect to the server.
    pub password: Option<String>,
    /// The port number of the server to connect to.
    pub port: Option<u16>,
    /// TLS configuration.
    pub tls: Option<IrcTlsConfig>,
    /// List of channels to join once registered.
    #[serde(default)]
    pub channels: HashMap<String, Option<IrcChannelConfig>>,
}

impl IrcConfig {
    /// Returns the configured port, or the conventional one for the TLS setting.
    #[must_use]
    pub fn port(&self) -> u16 {
        match self.port {
            Some(port) => port,
            None => self.fallback_port(),
        }
    }

    /// Return the port number to use based on whether the connection requires TLS or not.
    fn fallback_port(&self) -> u16 {
        if self.tls.as_ref().map(|tls| tls.enabled) == Some(true) {
            6697
        } else {
            6667
        }
    }
}

impl From<IrcConfig> for irc::client::data::Config {
    fn from(config: IrcConfig) -> Self {
        let port = config.port();
        let use_tls = config.tls.map(|x| x.enabled);
        let channel_keys = config
            .channels
            .iter()
            .filter_map(|(name, channel)| {
                let key = channel.as_ref()?.key.clone()?;

                Some((name.clone(), key))
            })
            .collect();
        let channels = config.channels.into_keys().collect::<Vec<_>>();

        // Nickname recovery is left to the session; without alternatives the client reports a
        // rejected nickname as `NoUsableNick`.
        irc::client::data::Config {
            nickname: Some(config.nickname),
            username: config.username,
            realname: config.realname,
            password: config.password,
            server: Some(config.hostname),
            port: Some(port),
            use_tls,
            channels,
            channel_keys,
            ..Default::default()
        }
    }
}

/// Modes are requested on join unless configured otherwise.
#[must_use]
pub const fn default_request_modes() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn it_should_default_missing_sections() {
        Jail::expect_with(|jail| {
            jail.create_file("zeta.toml", "[irc]\nnickname = \"zeta\"\nhostname = \"irc.example.com\"")?;

            let config = Config::load("zeta.toml").map_err(|e| e.to_string())?;

            assert_eq!(config.session, SessionConfig::default());
            assert!(config.session.request_modes);
            assert_eq!(config.tracing.format, Format::Json);
            assert_eq!(config.irc.nickname, "zeta");

            Ok(())
        });
    }

    #[test]
    fn it_should_merge_environment_over_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "zeta.toml",
                r#"
                [session]
                request_modes = true
                alt_nicks = ["zeta_", "zeta__"]

                [tracing]
                format = "pretty"
                "#,
            )?;
            jail.set_env("ZETA_SESSION__REQUEST_MODES", "false");
            jail.set_env("ZETA_TRACING__FORMAT", "compact");

            let config = Config::load("zeta.toml").map_err(|e| e.to_string())?;

            assert!(!config.session.request_modes);
            assert_eq!(config.session.alt_nicks, vec!["zeta_", "zeta__"]);
            assert_eq!(config.tracing.format, Format::Compact);

            Ok(())
        });
    }

    #[test]
    fn it_should_pick_port_from_tls() {
        let mut config = IrcConfig::default();
        assert_eq!(config.port(), 6667);

        config.tls = Some(IrcTlsConfig { enabled: true });
        assert_eq!(config.port(), 6697);

        config.port = Some(7000);
        assert_eq!(config.port(), 7000);
    }
}
