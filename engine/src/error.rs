//! Error types for the pipe monitor engine.
//!
//! `EngineError` covers both fatal setup problems (the input cannot be
//! inspected, the debug log cannot be opened) and failures of the copy loop.
//! Terminal-capability errors are also expressed here, but callers are
//! expected to degrade on them rather than abort the transfer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The input stream could not be stat-ed
    #[error("cannot stat input stream: {source}")]
    StatInput { source: io::Error },

    /// Reading from the input failed mid-transfer
    #[error("read failed after {transferred} bytes: {source}")]
    Read { transferred: u64, source: io::Error },

    /// Writing to the output failed mid-transfer
    #[error("write failed after {transferred} bytes: {source}")]
    Write { transferred: u64, source: io::Error },

    /// Flushing buffered output after the copy failed
    #[error("flush failed after {transferred} bytes: {source}")]
    Flush { transferred: u64, source: io::Error },

    /// `start()` was called on a transfer that is not pending
    #[error("transfer already started (state: {state})")]
    AlreadyStarted { state: crate::model::TransferState },

    /// The probed descriptor is not a terminal
    #[error("not a terminal")]
    TerminalUnavailable,

    /// The terminal did not answer the cursor position request in a usable form
    #[error("unable to read cursor position: {reason}")]
    CursorUnavailable { reason: String },

    /// Raw mode could not be entered by any means
    #[error("unable to enter raw mode: {source}")]
    RawMode { source: io::Error },

    /// Advisory lock acquisition failed for a reason other than contention
    #[error("unable to lock terminal: {source}")]
    Lock { source: io::Error },

    /// Advisory lock was still contended after the configured number of attempts
    #[error("gave up acquiring terminal lock after {attempts} attempts")]
    LockAbandoned { attempts: u32 },

    /// The debug log file could not be opened for appending
    #[error("cannot open debug log {}: {source}", path.display())]
    LogFile { path: PathBuf, source: io::Error },
}

impl EngineError {
    /// Bytes transferred before a copy-loop failure, if this is one.
    pub fn transferred(&self) -> Option<u64> {
        match self {
            Self::Read { transferred, .. }
            | Self::Write { transferred, .. }
            | Self::Flush { transferred, .. } => Some(*transferred),
            _ => None,
        }
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::StatInput { source }
            | Self::Read { source, .. }
            | Self::Write { source, .. }
            | Self::Flush { source, .. }
            | Self::RawMode { source }
            | Self::Lock { source }
            | Self::LogFile { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// True for errors the renderer should swallow and degrade on.
    pub fn is_terminal_capability(&self) -> bool {
        matches!(
            self,
            Self::TerminalUnavailable | Self::CursorUnavailable { .. } | Self::RawMode { .. }
        )
    }
}
