// src/logging.rs

use env_logger::{Builder, Env};

/// Installs the process logger: `info` unless `RUST_LOG` says otherwise.
/// Binaries call this once; library code only uses the `log` macros.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let _ = Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
}
