//! Logging setup for the `modsync` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the binary (and to tests that want output).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { "modsync=debug,info" } else { "info" }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `verbose`.
///
/// Events go to stderr so that stdout stays usable for `modsync version`
/// and `modsync cache path`. `NO_COLOR` disables ANSI output.
pub fn init_logging(verbose: bool) {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(default_filter(verbose)),
    };

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_ids(false)
                .with_ansi(std::env::var_os("NO_COLOR").is_none()),
        )
        .with(env_filter)
        .try_init();
}
