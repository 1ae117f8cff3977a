use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Installs the global subscriber on stderr. `RUST_LOG` overrides the
/// default filter.
pub fn init_logger(verbose: bool, json: bool) {
  let default = if verbose { "odesolve=debug" } else { "odesolve=info" };
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default));

  let layer = tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .with_target(false)
    .with_thread_ids(false)
    .with_file(false)
    .with_line_number(false);

  if json {
    tracing_subscriber::registry()
      .with(filter)
      .with(layer.json())
      .init();
  } else {
    tracing_subscriber::registry()
      .with(filter)
      .with(layer.compact())
      .init();
  }
}
