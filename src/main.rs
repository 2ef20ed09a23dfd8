use argh::FromArgs;
use miette::WrapErr;
use tracing::{trace, warn};

use zeta_session::Config;

/// Connects to an IRC server and logs everything the session sees.
#[derive(Debug, FromArgs)]
struct Opts {
    /// path to config file
    #[argh(option, default = "String::from(\"config.toml\")")]
    config_path: String,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Parse command-line arguments
    let opts: Opts = argh::from_env();

    println!(
        "{} v{} running",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    // Load the config file, with overrides from the environment
    let config = Config::load(&opts.config_path).wrap_err("could not load config")?;

    // Initialize logging
    zeta_session::tracing::try_init(&config.tracing)?;

    trace!(path = %opts.config_path, "loaded config");

    let result = zeta_session::client::run(&config)
        .await
        .wrap_err("session failed");

    warn!("the session stopped");

    result
}
