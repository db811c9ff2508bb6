//! Configuration passed explicitly into the engine's collaborators.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sampler::SAMPLE_PERIOD;

/// Debug log file used when diagnostics are enabled without a path.
pub const DEFAULT_LOG_FILE: &str = "debug.txt";

/// Where diagnostic lines go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
}

impl DiagnosticsConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(path: Option<PathBuf>) -> Self {
        DiagnosticsConfig {
            enabled: true,
            path,
        }
    }

    /// File diagnostics are appended to, or `None` when they are discarded.
    pub fn log_path(&self) -> Option<&Path> {
        if !self.enabled {
            return None;
        }
        Some(
            self.path
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_LOG_FILE)),
        )
    }
}

/// Tuning for the cursor-position round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Sleep between advisory lock attempts
    pub lock_retry_interval: Duration,

    /// Give up after this many contended attempts; `None` keeps retrying
    pub lock_max_attempts: Option<u32>,

    /// How long to wait for the terminal to answer `ESC[6n`
    pub response_timeout: Duration,

    /// Shell out to `stty` when termios calls fail
    pub allow_stty_fallback: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            lock_retry_interval: Duration::from_millis(50),
            lock_max_attempts: None,
            response_timeout: Duration::from_millis(500),
            allow_stty_fallback: true,
        }
    }
}

/// Tuning for the copy loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    pub sample_period: Duration,
    pub buffer_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            sample_period: SAMPLE_PERIOD,
            buffer_size: 32 * 1024,
        }
    }
}
