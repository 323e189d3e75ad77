//! Logger setup for the server binary

use log::{info, warn};
use std::path::Path;

use crate::config::LoggingConfig;

/// Initialise log4rs from the configured file, or env_logger when it is absent
pub fn init_logging(config: &LoggingConfig) {
    let path = Path::new(&config.config_file);
    if path.exists() {
        match log4rs::init_file(path, Default::default()) {
            Ok(()) => {
                info!("Logging configured from {}", path.display());
                return;
            }
            Err(e) => eprintln!("Failed to load log configuration {}: {}", path.display(), e),
        }
    }

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
    warn!("Log configuration {} not usable, logging to stderr", path.display());
}
