//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install the global subscriber; `RUST_LOG` overrides the default filter
///
/// Logs go to stderr so reports on stdout stay machine-readable.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,taleweave_core=info,taleweave_server=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    // A second init keeps the first subscriber
    if let Err(e) = installed {
        eprintln!("tracing subscriber not installed: {e}");
    }
}
