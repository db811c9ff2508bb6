//! Core data model for a monitored transfer.
//!
//! - TransferStats: immutable snapshot handed to observers
//! - TransferState: lifecycle of a single transfer
//! - TerminalGeometry, CursorPosition: what the terminal probe reports

use std::fmt;
use std::time::Duration;

/// Snapshot of a transfer at one point in time.
///
/// Built fresh for every notification and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferStats {
    /// Bytes accepted by the output so far
    pub transferred_bytes: u64,

    /// Time since the transfer started
    pub elapsed: Duration,
}

impl TransferStats {
    pub fn new(transferred_bytes: u64, elapsed: Duration) -> Self {
        TransferStats {
            transferred_bytes,
            elapsed,
        }
    }

    /// Average throughput in bytes per second; zero before any time has passed.
    pub fn average_speed(&self) -> f64 {
        if self.elapsed.is_zero() {
            return 0.0;
        }
        self.transferred_bytes as f64 / self.elapsed.as_secs_f64()
    }
}

/// Lifecycle of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Created, not yet started
    Pending,
    /// Copy loop running
    Running,
    /// Input drained or copy aborted by an I/O error
    Completed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Pending => write!(f, "Pending"),
            TransferState::Running => write!(f, "Running"),
            TransferState::Completed => write!(f, "Completed"),
        }
    }
}

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalGeometry {
    pub columns: u16,
    pub rows: u16,
}

impl TerminalGeometry {
    /// Width assumed when the terminal size cannot be queried.
    pub const FALLBACK_COLUMNS: u16 = 80;

    /// Columns of `geometry`, or the fallback width when unknown.
    pub fn columns_or_fallback(geometry: Option<TerminalGeometry>) -> u16 {
        match geometry {
            Some(g) if g.columns > 0 => g.columns,
            _ => Self::FALLBACK_COLUMNS,
        }
    }
}

/// Cursor location as reported by the terminal (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
    pub column: u16,
    pub line: u16,
}
