//! Logging setup for the amdgraph binary
//!
//! `RUST_LOG` takes precedence over the configured filter; without either
//! the level defaults to "info". Output goes to stderr.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber
///
/// `filter` comes from `build.log` in amdgraph.toml or the `--log` flag.
pub fn init_logging(filter: Option<&str>) {
    let env_filter = match (std::env::var("RUST_LOG").is_ok(), filter) {
        (true, _) => EnvFilter::from_default_env(),
        (false, Some(f)) => EnvFilter::new(f),
        (false, None) => EnvFilter::new("info"),
    };

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(env_filter)
        .try_init();
}
