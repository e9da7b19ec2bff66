//! Logger initialisation

use crate::config::LoggingConfig;

/// Install the global `env_logger` from `config`
///
/// `RUST_LOG`, when set, is applied on top of the configured level. Returns
/// false if a logger was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&config.level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder
        .format_timestamp_millis()
        .format_module_path(config.module_path)
        .try_init()
        .is_ok()
}
