use miette::{IntoDiagnostic, WrapErr};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Format, TracingConfig};

/// The filter directive used when `RUST_LOG` isn't set.
const DEFAULT_FILTER: &str = "zeta_session=debug";

/// Installs the global tracing subscriber, writing to stdout in the configured format.
///
/// # Errors
///
/// Fails if a global subscriber has already been installed.
pub fn try_init(tracing: &TracingConfig) -> miette::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match tracing.format {
        Format::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        Format::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        Format::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
    }
    .into_diagnostic()
    .wrap_err("could not init registry")?;

    info!("tracing initialized");

    Ok(())
}
