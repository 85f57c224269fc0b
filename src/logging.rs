//! Structured logging setup.
//!
//! Logs go to stderr through `tracing-subscriber`. `RUST_LOG` takes
//! precedence; otherwise the level is `info`, or `debug` with `--verbose`.

use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

pub fn init_logging(verbose: bool, json: bool) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let default_level = if verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("frame_critic={0},fcrit={0},warn", default_level))
        });

        let layer: Box<dyn Layer<Registry> + Send + Sync> = if json {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(atty::is(atty::Stream::Stderr))
                .with_filter(filter)
                .boxed()
        };

        // Another subscriber may already be installed (e.g. by a test harness).
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("tracing subscriber already initialized");
        }
    });
}
