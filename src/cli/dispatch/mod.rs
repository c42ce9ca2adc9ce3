use crate::{
    cli::actions::Action,
    tls::{ConnectorConfig, ProtocolMode},
};
use anyhow::{Context, Result};
use clap::ArgMatches;
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Convert `ArgMatches` into typed Action enum with validation
///
/// # Errors
///
/// Returns an error if the mode is unknown, no host is given, or the CA bundle
/// cannot be loaded
pub async fn dispatch(matches: &ArgMatches) -> Result<Action> {
    let hosts: Vec<String> = matches
        .get_many::<String>("host")
        .context("at least one host is required")?
        .cloned()
        .collect();

    let mode = matches
        .get_one::<String>("mode")
        .map_or(Ok(ProtocolMode::default()), |mode| mode.parse::<ProtocolMode>())?;

    // Fall back to the mode's well-known port
    let port = matches
        .get_one::<i32>("port")
        .copied()
        .unwrap_or_else(|| i32::from(mode.default_port()));

    let seconds = |name: &str, default: Duration| {
        matches
            .get_one::<u64>(name)
            .copied()
            .map_or(default, Duration::from_secs)
    };

    let ca = matches.get_one::<String>("ca").map(PathBuf::from);
    let roots = crate::tls::load_root_store(ca.as_deref())
        .await
        .context("failed to load trusted roots")?;

    let defaults = ConnectorConfig::default();
    let config = ConnectorConfig {
        connect_timeout: seconds("connect-timeout", defaults.connect_timeout),
        io_timeout: seconds("io-timeout", defaults.io_timeout),
        handshake_timeout: seconds("handshake-timeout", defaults.handshake_timeout),
        roots: Arc::new(roots),
    };

    Ok(Action::Inspect {
        hosts,
        port,
        mode,
        config,
    })
}
