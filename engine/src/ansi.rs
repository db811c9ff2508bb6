//! Terminal control sequences and ANSI-aware width measurement.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use unicode_width::UnicodeWidthStr;

pub const HIDE_CURSOR: &str = "\x1b[?25l";
pub const SHOW_CURSOR: &str = "\x1b[?25h";
pub const SAVE_CURSOR: &str = "\x1b[s";
pub const RESTORE_CURSOR: &str = "\x1b[u";
pub const CLEAR_LINE: &str = "\x1b[2K";

/// Asks the terminal to report the cursor as `ESC[<row>;<col>R` on its input.
pub const CURSOR_POSITION_REQUEST: &str = "\x1b[6n";

/// Move to the beginning of the line `n` lines up.
pub fn move_up(n: u16) -> String {
    format!("\x1b[{}F", n)
}

/// Absolute cursor position, 1-based.
pub fn move_to(column: u16, line: u16) -> String {
    format!("\x1b[{};{}f", line, column)
}

fn csi_pattern() -> &'static Regex {
    static CSI: OnceLock<Regex> = OnceLock::new();
    CSI.get_or_init(|| Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").expect("CSI pattern is valid"))
}

/// Remove CSI escape sequences.
pub fn strip(s: &str) -> Cow<'_, str> {
    csi_pattern().replace_all(s, "")
}

/// Columns `s` occupies once escape sequences are removed.
pub fn visible_width(s: &str) -> usize {
    strip(s).width()
}
