//! Installs a `tracing` subscriber for applications embedding the network.
//!
//! ## Log Levels
//!
//! - **INFO**: network built
//! - **DEBUG**: instance created, flush summaries
//! - **TRACE**: per-layer propagation counts
//! - **ERROR**: a network was poisoned
//!
//! `RUST_LOG` takes precedence over the defaults.

use std::sync::OnceLock;

use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Initializes logging with `bavet_network=info`.
///
/// Safe to call multiple times - only the first call has effect. If another
/// global subscriber is already installed it is left in place.
pub fn init() {
    init_with_level(LevelFilter::INFO);
}

/// Initializes logging with the network crate at `level`.
pub fn init_with_level(level: LevelFilter) {
    INIT.get_or_init(|| {
        let mut filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy();
        if let Ok(directive) = format!("bavet_network={}", level).parse::<Directive>() {
            filter = filter.add_directive(directive);
        }

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init();
    });
}
