//! Ferrule runtime library
//!
//! Value model, scopes, signature dispatch and exceptions for an embeddable
//! dynamic scripting language, plus a small stdlib and an interactive shell.

pub mod config;
pub mod error;
pub mod interp;
pub mod repl;
pub mod stdlib;
pub mod util;

use std::sync::Once;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use interp::{Runtime, Value};

static TRACING_INIT: Once = Once::new();

/// Install the global subscriber once.
///
/// `RUST_LOG` wins when set; otherwise `verbose` enables debug output for
/// this crate and nothing is installed without it.
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = match std::env::var("RUST_LOG") {
            Ok(_) => EnvFilter::from_default_env(),
            Err(_) if verbose => EnvFilter::new("ferrule=debug"),
            Err(_) => return,
        };
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    });
}
