//! Logging utils.

use tracing_subscriber::EnvFilter;

/// Initialize stderr logging.
///
/// It uses `RSROLL_LOG` environment variable to control the logging level.
/// Defaults to `error`.
pub fn init() {
  let env_filter = EnvFilter::try_from_env("RSROLL_LOG")
    .unwrap_or_else(|_| EnvFilter::new("error"));

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr)
    .try_init()
    .ok();
}
