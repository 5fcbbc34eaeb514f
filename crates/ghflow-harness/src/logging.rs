use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a test-writer subscriber once per process. `RUST_LOG` wins over
/// the filter from the ghflow config.
pub fn init_test_logging() {
    let filter = ghflow_config::load_from_env()
        .map(|config| config.logging.filter)
        .unwrap_or_else(|_| "info".to_owned());
    init_test_logging_with(&filter);
}

pub fn init_test_logging_with(default_filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        // Another subscriber may already be installed by the test binary.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_test_writer()
            .try_init();
    });
}
