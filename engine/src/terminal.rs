//! Terminal probing.
//!
//! The probe answers two questions about the controlling terminal:
//! - how large is it (`TIOCGWINSZ`), and
//! - where is the cursor (`ESC[6n` round trip in raw mode).
//!
//! The cursor round trip writes a request to the terminal and reads the
//! reply from the same device, so only one process may do it at a time. It is
//! serialized with an fcntl advisory lock on the terminal, and raw mode is
//! entered and restored through guards so every exit path restores the
//! terminal.
//!
//! Platforms without termios get `NullProbe`, which reports nothing.

use std::sync::OnceLock;

use regex::bytes::Regex;

use crate::error::EngineError;
use crate::model::{CursorPosition, TerminalGeometry};

/// Answers geometry and cursor questions about a terminal.
pub trait TerminalProbe {
    /// True when the probed descriptor is an interactive terminal.
    fn is_terminal(&self) -> bool;

    /// Current size, or `None` when it cannot be determined.
    fn geometry(&self) -> Option<TerminalGeometry>;

    /// Current cursor position via an escape-sequence round trip.
    fn cursor_position(&self) -> Result<CursorPosition, EngineError>;
}

/// Probe for outputs that are not terminals.
///
/// Never touches any descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProbe;

impl TerminalProbe for NullProbe {
    fn is_terminal(&self) -> bool {
        false
    }

    fn geometry(&self) -> Option<TerminalGeometry> {
        None
    }

    fn cursor_position(&self) -> Result<CursorPosition, EngineError> {
        Err(EngineError::TerminalUnavailable)
    }
}

/// Longest reply accepted from the terminal before giving up.
const MAX_RESPONSE_LEN: usize = 32;

fn cursor_report_pattern() -> &'static Regex {
    static REPORT: OnceLock<Regex> = OnceLock::new();
    REPORT.get_or_init(|| Regex::new(r"(\d+);(\d+)R").expect("cursor report pattern is valid"))
}

/// Extract the position from a cursor position report such as `ESC[12;40R`.
///
/// Bytes before the report (typed-ahead input) are ignored.
pub fn parse_cursor_response(response: &[u8]) -> Option<CursorPosition> {
    let captures = cursor_report_pattern().captures(response)?;
    let line = std::str::from_utf8(captures.get(1)?.as_bytes()).ok()?.parse().ok()?;
    let column = std::str::from_utf8(captures.get(2)?.as_bytes()).ok()?.parse().ok()?;
    Some(CursorPosition { column, line })
}

/// Probe for stderr: the real terminal probe when stderr is a TTY, otherwise `NullProbe`.
pub fn stderr_probe(config: crate::config::ProbeConfig) -> Box<dyn TerminalProbe> {
    #[cfg(unix)]
    {
        match unix::TtyProbe::stderr(config) {
            Ok(probe) => return Box::new(probe),
            Err(e) => tracing::debug!(error = %e, "stderr is not probeable; using null probe"),
        }
    }
    #[cfg(not(unix))]
    let _ = config;

    Box::new(NullProbe)
}

#[cfg(unix)]
pub use unix::TtyProbe;

#[cfg(unix)]
mod unix {
    use std::fs::File;
    use std::io::{self, IsTerminal, Read, Write};
    use std::os::fd::{AsFd, AsRawFd, RawFd};
    use std::process::{Command, Stdio};
    use std::thread;

    use tracing::{debug, warn};

    use super::{parse_cursor_response, TerminalProbe, MAX_RESPONSE_LEN};
    use crate::ansi::CURSOR_POSITION_REQUEST;
    use crate::config::ProbeConfig;
    use crate::error::EngineError;
    use crate::model::{CursorPosition, TerminalGeometry};

    /// Probe backed by a terminal device.
    pub struct TtyProbe {
        tty: File,
        config: ProbeConfig,
    }

    impl TtyProbe {
        /// Probe the terminal behind stderr.
        ///
        /// Fails with `TerminalUnavailable` when stderr is redirected.
        pub fn stderr(config: ProbeConfig) -> Result<Self, EngineError> {
            let fd = io::stderr()
                .as_fd()
                .try_clone_to_owned()
                .map_err(|_| EngineError::TerminalUnavailable)?;
            Self::from_file(File::from(fd), config)
        }

        /// Probe an already opened terminal, such as `/dev/tty`.
        pub fn from_file(tty: File, config: ProbeConfig) -> Result<Self, EngineError> {
            if !tty.is_terminal() {
                return Err(EngineError::TerminalUnavailable);
            }
            Ok(TtyProbe { tty, config })
        }

        #[cfg(test)]
        pub(super) fn new_unchecked(tty: File, config: ProbeConfig) -> Self {
            TtyProbe { tty, config }
        }

        fn request_position(&self) -> Result<CursorPosition, EngineError> {
            let unavailable = |reason: String| EngineError::CursorUnavailable { reason };

            (&self.tty)
                .write_all(CURSOR_POSITION_REQUEST.as_bytes())
                .and_then(|_| (&self.tty).flush())
                .map_err(|e| unavailable(format!("request failed: {}", e)))?;

            let response = read_response(&self.tty).map_err(|e| unavailable(e.to_string()))?;
            parse_cursor_response(&response).ok_or_else(|| {
                unavailable(format!(
                    "unexpected reply {:?}",
                    String::from_utf8_lossy(&response)
                ))
            })
        }
    }

    impl TerminalProbe for TtyProbe {
        fn is_terminal(&self) -> bool {
            self.tty.is_terminal()
        }

        fn geometry(&self) -> Option<TerminalGeometry> {
            let mut winsize = std::mem::MaybeUninit::<libc::winsize>::uninit();
            let result =
                unsafe { libc::ioctl(self.tty.as_raw_fd(), libc::TIOCGWINSZ, winsize.as_mut_ptr()) };
            if result != 0 {
                return None;
            }

            let winsize = unsafe { winsize.assume_init() };
            if winsize.ws_col == 0 {
                return None;
            }
            Some(TerminalGeometry {
                columns: winsize.ws_col,
                rows: winsize.ws_row,
            })
        }

        fn cursor_position(&self) -> Result<CursorPosition, EngineError> {
            // Drop order matters: raw mode is restored before the lock is released.
            let _lock = AdvisoryLock::acquire(&self.tty, &self.config)?;
            let _raw = RawModeGuard::enter(&self.tty, &self.config)?;

            let position = self.request_position();
            match &position {
                Ok(p) => debug!(line = p.line, column = p.column, "got cursor position"),
                Err(e) => debug!(error = %e, "cursor position unavailable"),
            }
            position
        }
    }

    /// Read the terminal's reply up to and including the terminating `R`.
    ///
    /// Returns what was read so far if the terminal stays silent past the
    /// raw-mode read timeout.
    fn read_response(mut tty: &File) -> io::Result<Vec<u8>> {
        let mut response = Vec::with_capacity(16);
        let mut byte = [0u8; 1];
        while response.len() < MAX_RESPONSE_LEN {
            match tty.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    response.push(byte[0]);
                    if byte[0] == b'R' {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(response)
    }

    fn set_lock(fd: RawFd, exclusive: bool) -> io::Result<()> {
        let lock_type = if exclusive { libc::F_WRLCK } else { libc::F_UNLCK };
        let mut flock: libc::flock = unsafe { std::mem::zeroed() };
        flock.l_type = lock_type as libc::c_short;
        flock.l_whence = libc::SEEK_SET as libc::c_short;
        flock.l_start = 0;
        flock.l_len = 1;

        let result = unsafe { libc::fcntl(fd, libc::F_SETLK, &flock as *const libc::flock) };
        if result == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    fn is_contention(err: &io::Error) -> bool {
        matches!(
            err.raw_os_error(),
            Some(code) if code == libc::EACCES || code == libc::EAGAIN || code == libc::EINTR
        )
    }

    /// Exclusive fcntl lock on the first byte of the terminal, released on drop.
    pub(super) struct AdvisoryLock<'f> {
        file: &'f File,
    }

    impl<'f> AdvisoryLock<'f> {
        pub(super) fn acquire(file: &'f File, config: &ProbeConfig) -> Result<Self, EngineError> {
            let mut attempts: u32 = 0;
            loop {
                attempts += 1;
                match set_lock(file.as_raw_fd(), true) {
                    Ok(()) => {
                        debug!(attempts, "got terminal lock");
                        return Ok(AdvisoryLock { file });
                    }
                    Err(e) if is_contention(&e) => {
                        if config.lock_max_attempts.is_some_and(|max| attempts >= max) {
                            return Err(EngineError::LockAbandoned { attempts });
                        }
                        debug!(attempts, "could not acquire terminal lock, sleeping");
                        thread::sleep(config.lock_retry_interval);
                    }
                    Err(e) => return Err(EngineError::Lock { source: e }),
                }
            }
        }
    }

    impl Drop for AdvisoryLock<'_> {
        fn drop(&mut self) {
            match set_lock(self.file.as_raw_fd(), false) {
                Ok(()) => debug!("released terminal lock"),
                Err(e) => debug!(error = %e, "could not release terminal lock"),
            }
        }
    }

    enum RawMode<'f> {
        Termios { fd: RawFd, original: libc::termios },
        Stty { tty: &'f File },
    }

    /// Raw input mode for the duration of the guard.
    pub(super) struct RawModeGuard<'f> {
        mode: RawMode<'f>,
    }

    impl<'f> RawModeGuard<'f> {
        pub(super) fn enter(tty: &'f File, config: &ProbeConfig) -> Result<Self, EngineError> {
            match enter_termios(tty.as_raw_fd(), config) {
                Ok(mode) => Ok(RawModeGuard { mode }),
                Err(e) if config.allow_stty_fallback => {
                    debug!(error = %e, "termios unavailable; falling back to stty");
                    let time = read_timeout(config).to_string();
                    run_stty(tty, &["raw", "-echo", "min", "0", "time", &time])
                        .map_err(|source| EngineError::RawMode { source })?;
                    Ok(RawModeGuard {
                        mode: RawMode::Stty { tty },
                    })
                }
                Err(source) => Err(EngineError::RawMode { source }),
            }
        }
    }

    impl Drop for RawModeGuard<'_> {
        fn drop(&mut self) {
            match &self.mode {
                RawMode::Termios { fd, original } => {
                    let result = unsafe { libc::tcsetattr(*fd, libc::TCSANOW, original) };
                    if result != 0 {
                        warn!("failed to restore terminal settings");
                    }
                }
                RawMode::Stty { tty } => {
                    // stty cannot restore the exact previous settings, only cooked mode.
                    if let Err(e) = run_stty(tty, &["-raw", "echo"]) {
                        warn!(error = %e, "stty -raw failed; run `stty sane` to restore the terminal");
                    }
                }
            }
        }
    }

    /// Reply timeout in the deciseconds termios and stty expect.
    pub(super) fn read_timeout(config: &ProbeConfig) -> u8 {
        (config.response_timeout.as_millis() / 100).clamp(1, 255) as u8
    }

    fn enter_termios(fd: RawFd, config: &ProbeConfig) -> io::Result<RawMode<'static>> {
        let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();
        if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let original = unsafe { termios.assume_init() };

        let mut raw = original;
        raw.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
        raw.c_cflag |= libc::CS8;
        raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);

        // A silent terminal makes read() return 0 after the timeout instead of blocking.
        raw.c_cc[libc::VMIN] = 0;
        raw.c_cc[libc::VTIME] = read_timeout(config) as libc::cc_t;

        if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(RawMode::Termios { fd, original })
    }

    fn run_stty(tty: &File, args: &[&str]) -> io::Result<()> {
        let status = Command::new("stty")
            .args(args)
            .stdin(Stdio::from(tty.try_clone()?))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("stty {} exited with {}", args.join(" "), status),
            ))
        }
    }
}
