//! Debug log setup.
//!
//! Diagnostics are discarded unless enabled. When enabled, engine events are
//! appended to the configured file without timestamps or colors.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use engine::{DiagnosticsConfig, EngineError};
use tracing::level_filters::LevelFilter;
use tracing::Subscriber;

/// Install the debug log subscriber, if diagnostics are enabled.
pub fn init(config: &DiagnosticsConfig) -> Result<(), EngineError> {
    if let Some(subscriber) = build_subscriber(config)? {
        // Only fails if a subscriber is already installed, which keeps precedence.
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
    Ok(())
}

/// Subscriber writing to the configured log file, or `None` when disabled.
pub fn build_subscriber(
    config: &DiagnosticsConfig,
) -> Result<Option<impl Subscriber + Send + Sync + 'static>, EngineError> {
    let Some(path) = config.log_path() else {
        return Ok(None);
    };
    let file = open_log(path)?;

    let subscriber = tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_max_level(LevelFilter::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .finish();
    Ok(Some(subscriber))
}

fn open_log(path: &Path) -> Result<File, EngineError> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).map_err(|source| EngineError::LogFile {
        path: path.to_path_buf(),
        source,
    })
}
