//! # pipemon engine - monitored pipe transfer
//!
//! Copies one byte stream from an input to an output while a live progress
//! indicator is drawn on the terminal.
//!
//! ## Overview
//!
//! - A `CountingWriter` wraps the output and keeps a shared byte total
//! - A `Sampler` reads that total every 100 ms on its own thread
//! - `MonitoredTransfer` runs the copy and hands each sample to observers
//!   on the calling thread, then sends one final notification at the end
//! - `Progress` renders a bar (known size) or a spinner (unknown size)
//! - `TerminalProbe` reports terminal size and cursor position
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{
//!     stderr_probe, MonitoredTransfer, ProbeConfig, Progress, TerminalRenderer, TransferObserver,
//!     TransferStats,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let input = std::fs::File::open("disk.img")?;
//! let total = input.metadata()?.len();
//!
//! let progress = Progress::new(total, stderr_probe(ProbeConfig::default()), &mut std::io::stderr())?;
//! let mut renderer = TerminalRenderer::new(progress, std::io::stderr());
//!
//! {
//!     let mut transfer = MonitoredTransfer::new(input, std::io::sink(), total);
//!     transfer.add_observer(|stats: TransferStats| renderer.on_stats(stats));
//!     transfer.start()?;
//! }
//! renderer.finish();
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: TransferStats, TransferState, terminal geometry and cursor types
//! - **error**: EngineError
//! - **config**: diagnostics, probe and transfer configuration
//! - **counting**: byte-counting output wrapper
//! - **sampler**: periodic count sampler
//! - **observer**: observer trait and registry
//! - **transfer**: the copy-and-notify engine
//! - **terminal**: terminal size and cursor probing
//! - **ansi**: control sequences and ANSI-aware width
//! - **format**: byte, duration and speed formatting
//! - **progress**: bar and spinner renderers

pub mod ansi;
pub mod config;
pub mod counting;
pub mod error;
pub mod format;
pub mod model;
pub mod observer;
pub mod progress;
pub mod sampler;
pub mod terminal;
pub mod transfer;

// Re-export main types and functions
pub use config::{DiagnosticsConfig, ProbeConfig, TransferConfig, DEFAULT_LOG_FILE};
pub use counting::{ByteCounter, CountingWriter, ObservableCount};
pub use error::EngineError;
pub use format::{format_elapsed, format_speed, human_bytes};
pub use model::{CursorPosition, TerminalGeometry, TransferState, TransferStats};
pub use observer::{ObserverRegistry, TransferObserver};
pub use progress::{is_bounded, FiniteProgress, InfiniteProgress, Progress, TerminalRenderer};
pub use sampler::{Sampler, SAMPLE_PERIOD};
pub use terminal::{parse_cursor_response, stderr_probe, NullProbe, TerminalProbe};
pub use transfer::{size_hint, MonitoredTransfer};

#[cfg(unix)]
pub use terminal::TtyProbe;
