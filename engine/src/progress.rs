//! Progress renderers.
//!
//! `Progress` is chosen once from the size hint:
//! - `Finite` when the total is known: a centered byte count and bar that
//!   redraws itself in place by moving the cursor up a fixed number of lines.
//! - `Infinite` otherwise: a spinner line with bytes, elapsed time and average
//!   speed, redrawn on the terminal line the cursor occupied at construction.
//!
//! Renderers only produce frames. `TerminalRenderer` wires a `Progress` to an
//! output stream so it can be registered as a transfer observer.

use std::io::Write;

use tracing::debug;

use crate::ansi::{self, CLEAR_LINE, HIDE_CURSOR, RESTORE_CURSOR, SAVE_CURSOR, SHOW_CURSOR};
use crate::error::EngineError;
use crate::format::{format_elapsed, format_speed, human_bytes};
use crate::model::{TerminalGeometry, TransferStats};
use crate::observer::TransferObserver;
use crate::terminal::TerminalProbe;

/// Lines occupied by one finite frame: padding, bar, padding.
pub const FRAME_HEIGHT: u16 = 3;

/// Columns reserved next to the bar for the byte count and percentage.
const BAR_MARGIN: u16 = 20;
const MIN_BAR_WIDTH: usize = 10;

/// Cells around the bar itself: the space, both delimiters and `" 100%"`.
const BAR_DECORATION: usize = 8;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Whether a size hint selects the bounded renderer.
pub fn is_bounded(total_size: u64) -> bool {
    total_size > 0
}

/// Fill level of a bounded transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    total: u64,
    value: u64,
}

impl Bar {
    pub fn new(total: u64) -> Self {
        Bar { total, value: 0 }
    }

    /// Set the absolute value, clamped to `[0, total]`.
    pub fn set(&mut self, value: u64) {
        self.value = value.min(self.total);
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.value as f64 / self.total as f64
    }

    /// Render as `|█████░░░░░|  50%` with `width` cells between the delimiters.
    pub fn render(&self, width: usize) -> String {
        let ratio = self.ratio();
        let filled = ((width as f64 * ratio).ceil() as usize).min(width);
        format!(
            "|{}{}| {:3.0}%",
            "█".repeat(filled),
            "░".repeat(width - filled),
            ratio * 100.0
        )
    }
}

/// Renderer for transfers with a known size.
pub struct FiniteProgress {
    bar: Bar,
    current: TransferStats,
    probe: Box<dyn TerminalProbe>,
    drawn: bool,
}

impl FiniteProgress {
    pub fn new(total_size: u64, probe: Box<dyn TerminalProbe>) -> Self {
        FiniteProgress {
            bar: Bar::new(total_size),
            current: TransferStats::default(),
            probe,
            drawn: false,
        }
    }

    pub fn update(&mut self, stats: TransferStats) {
        self.current = stats;
        self.bar.set(stats.transferred_bytes);
    }

    pub fn bar(&self) -> &Bar {
        &self.bar
    }

    pub fn render(&mut self) -> String {
        // Queried per frame; the terminal may have been resized.
        let columns = TerminalGeometry::columns_or_fallback(self.probe.geometry());
        let bytes = human_bytes(self.current.transferred_bytes);

        // A wrapped line would break the fixed move-up, so the bar shrinks to fit.
        let fixed = ansi::visible_width(&bytes) + BAR_DECORATION;
        let bar_width = (columns.saturating_sub(BAR_MARGIN) as usize)
            .max(MIN_BAR_WIDTH)
            .min((columns as usize).saturating_sub(fixed));

        let line = format!("{} {}", bytes, self.bar.render(bar_width));
        let pad = (columns as usize).saturating_sub(ansi::visible_width(&line)) / 2;

        let mut frame = String::new();
        if self.drawn {
            frame.push_str(&ansi::move_up(FRAME_HEIGHT));
        }
        frame.push_str(CLEAR_LINE);
        frame.push('\n');
        frame.push_str(CLEAR_LINE);
        frame.push_str(&" ".repeat(pad));
        frame.push_str(&line);
        frame.push('\n');
        frame.push_str(CLEAR_LINE);
        frame.push('\n');

        self.drawn = true;
        frame
    }

    pub fn finish(&self) -> String {
        SHOW_CURSOR.to_string()
    }
}

/// Renderer for transfers of unknown size.
pub struct InfiniteProgress {
    current: TransferStats,
    frame: usize,
    line: Option<u16>,
}

impl InfiniteProgress {
    /// Build the spinner, pinning it to the cursor's current line when the
    /// terminal can report it.
    ///
    /// Writes the cursor-hide sequence and one newline to `term`. Lock
    /// failures are returned; every other probe failure falls back to
    /// redrawing on the current line.
    pub fn new(probe: &dyn TerminalProbe, term: &mut dyn Write) -> Result<Self, EngineError> {
        let _ = term.write_all(HIDE_CURSOR.as_bytes());
        let _ = term.flush();

        let line = if probe.is_terminal() {
            match probe.cursor_position() {
                Ok(position) => Some(position.line),
                Err(e) if e.is_terminal_capability() => {
                    debug!(error = %e, "spinner not pinned; redrawing on the current line");
                    None
                }
                Err(e) => {
                    let _ = term.write_all(SHOW_CURSOR.as_bytes());
                    let _ = term.flush();
                    return Err(e);
                }
            }
        } else {
            None
        };

        let _ = term.write_all(b"\n");
        let _ = term.flush();

        Ok(InfiniteProgress {
            current: TransferStats::default(),
            frame: 0,
            line,
        })
    }

    pub fn update(&mut self, stats: TransferStats) {
        self.current = stats;
    }

    /// Line the spinner redraws on, if the cursor could be probed.
    pub fn pinned_line(&self) -> Option<u16> {
        self.line
    }

    pub fn render(&mut self) -> String {
        let glyph = SPINNER_FRAMES[self.frame];
        self.frame = (self.frame + 1) % SPINNER_FRAMES.len();

        let text = format!(
            "{}{} transferring: {}, {}, {}",
            CLEAR_LINE,
            glyph,
            human_bytes(self.current.transferred_bytes),
            format_elapsed(self.current.elapsed),
            format_speed(&self.current)
        );
        match self.line {
            // Draw on the pinned line, then put the cursor back where output continues.
            Some(line) => format!("{}{}{}{}", SAVE_CURSOR, ansi::move_to(1, line), text, RESTORE_CURSOR),
            None => format!("\r{}", text),
        }
    }

    pub fn finish(&self) -> String {
        format!("\n{}", SHOW_CURSOR)
    }
}

/// Progress indicator, bounded or unbounded.
pub enum Progress {
    Finite(FiniteProgress),
    Infinite(InfiniteProgress),
}

impl Progress {
    /// Pick the renderer for `total_size`.
    ///
    /// Only the unbounded variant probes the cursor; see `InfiniteProgress::new`.
    pub fn new(
        total_size: u64,
        probe: Box<dyn TerminalProbe>,
        term: &mut dyn Write,
    ) -> Result<Self, EngineError> {
        if is_bounded(total_size) {
            Ok(Progress::Finite(FiniteProgress::new(total_size, probe)))
        } else {
            Ok(Progress::Infinite(InfiniteProgress::new(probe.as_ref(), term)?))
        }
    }

    pub fn update(&mut self, stats: TransferStats) {
        match self {
            Progress::Finite(p) => p.update(stats),
            Progress::Infinite(p) => p.update(stats),
        }
    }

    pub fn render(&mut self) -> String {
        match self {
            Progress::Finite(p) => p.render(),
            Progress::Infinite(p) => p.render(),
        }
    }

    /// Trailing output that leaves the terminal below the indicator with a visible cursor.
    pub fn finish(&self) -> String {
        match self {
            Progress::Finite(p) => p.finish(),
            Progress::Infinite(p) => p.finish(),
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Progress::Finite(_))
    }
}

/// Draws a `Progress` to `out` on every notification.
///
/// Write errors are ignored; a broken progress display never stops the copy.
pub struct TerminalRenderer<W: Write> {
    progress: Progress,
    out: W,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(progress: Progress, out: W) -> Self {
        TerminalRenderer { progress, out }
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Emit the trailing sequence and hand back the output.
    pub fn finish(mut self) -> W {
        let _ = self.out.write_all(self.progress.finish().as_bytes());
        let _ = self.out.flush();
        self.out
    }
}

impl<W: Write> TransferObserver for TerminalRenderer<W> {
    fn on_stats(&mut self, stats: TransferStats) {
        self.progress.update(stats);
        let frame = self.progress.render();
        let _ = self.out.write_all(frame.as_bytes());
        let _ = self.out.flush();
    }
}
