use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber for the process.
///
/// `RUST_LOG` wins when set; otherwise `verbosity` 0..=3 selects
/// warn/info/debug/trace. Returns false if a global subscriber was already
/// installed, in which case nothing changes.
pub fn init_tracing(verbosity: u8) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbosity {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
