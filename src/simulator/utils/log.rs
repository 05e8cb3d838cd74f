use env_logger::Env;
use log::LevelFilter;

/// Install the env_logger backend; `RUST_LOG` wins over the default `info`.
///
/// Safe to call more than once, later calls are no-ops.
pub fn init_log() {
  let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
    .format_timestamp(None)
    .format_target(false)
    .try_init();
}

/// Quiet mode keeps warnings and errors only
pub fn set_quiet(quiet: bool) {
  if quiet && log::max_level() > LevelFilter::Warn {
    log::set_max_level(LevelFilter::Warn);
  }
}

