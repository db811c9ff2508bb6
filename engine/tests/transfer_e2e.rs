//! End-to-end transfer tests: real files in, renderers observing.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use engine::{
    ansi, size_hint, CursorPosition, EngineError, MonitoredTransfer, NullProbe, Progress,
    TerminalGeometry, TerminalProbe, TerminalRenderer, TransferObserver, TransferStats,
    SAMPLE_PERIOD,
};

const FILE_SIZE: usize = 5_000_000;

fn write_fixture(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("input.bin");
    let data: Vec<u8> = (0..FILE_SIZE).map(|i| (i % 253) as u8).collect();
    fs::write(&path, &data).expect("Failed to write fixture");
    path
}

/// Slows the underlying reader so the copy spans several sampling periods.
struct Throttled<R> {
    inner: R,
    delay: Duration,
}

impl<R: Read> Read for Throttled<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        std::thread::sleep(self.delay);
        let limit = buf.len().min(256 * 1024);
        self.inner.read(&mut buf[..limit])
    }
}

/// Counts cursor requests; never a terminal.
struct RecordingProbe {
    cursor_calls: Rc<Cell<usize>>,
}

impl TerminalProbe for RecordingProbe {
    fn is_terminal(&self) -> bool {
        false
    }

    fn geometry(&self) -> Option<TerminalGeometry> {
        None
    }

    fn cursor_position(&self) -> Result<CursorPosition, EngineError> {
        self.cursor_calls.set(self.cursor_calls.get() + 1);
        Err(EngineError::TerminalUnavailable)
    }
}

#[test]
fn test_regular_file_transfer_reports_exact_total() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = write_fixture(&dir);

    let input = fs::File::open(&path).expect("Failed to open fixture");
    let total = size_hint(&input.metadata().expect("metadata"));
    assert_eq!(total, FILE_SIZE as u64);

    let output_path = dir.path().join("output.bin");
    let output = fs::File::create(&output_path).expect("Failed to create output");

    let seen = RefCell::new(Vec::new());
    let started = Instant::now();
    {
        let mut transfer = MonitoredTransfer::new(input, io::BufWriter::new(output), total);
        transfer.add_observer(|stats: TransferStats| seen.borrow_mut().push(stats.transferred_bytes));
        let stats = transfer.start().expect("transfer failed");
        assert_eq!(stats.transferred_bytes, FILE_SIZE as u64);
    }
    let duration = started.elapsed();

    let seen = seen.into_inner();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "counts decreased: {:?}", seen);
    assert_eq!(seen.last(), Some(&(FILE_SIZE as u64)));
    if duration > SAMPLE_PERIOD * 2 {
        assert!(seen.len() >= 2, "no intermediate notification in {:?}", duration);
    }

    let copied = fs::read(&output_path).expect("Failed to read output");
    assert_eq!(copied, fs::read(&path).expect("Failed to read fixture"));
}

#[test]
fn test_slow_transfer_has_intermediate_notifications() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = write_fixture(&dir);

    let input = fs::File::open(&path).expect("Failed to open fixture");
    let total = size_hint(&input.metadata().expect("metadata"));
    let reader = Throttled {
        inner: input,
        delay: Duration::from_millis(15),
    };

    let seen = RefCell::new(Vec::new());
    {
        let mut transfer = MonitoredTransfer::new(reader, io::sink(), total);
        transfer.add_observer(|stats: TransferStats| seen.borrow_mut().push(stats.transferred_bytes));
        transfer.start().expect("transfer failed");
    }

    // 20 reads of 256 KiB at 15 ms each is roughly 300 ms, three sampling periods.
    let seen = seen.into_inner();
    assert!(seen.len() >= 2, "expected intermediate notifications, got {:?}", seen);
    assert!(seen[..seen.len() - 1].iter().all(|&n| n <= FILE_SIZE as u64));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*seen.last().expect("final notification"), FILE_SIZE as u64);
}

#[test]
fn test_finite_renderer_ends_at_full_bar() {
    let data = vec![0u8; 64 * 1024];
    let mut term = Vec::new();
    let progress = Progress::new(data.len() as u64, Box::new(NullProbe), &mut term)
        .expect("progress");
    assert!(progress.is_finite());

    let mut renderer = TerminalRenderer::new(progress, Vec::new());
    {
        let mut transfer = MonitoredTransfer::new(io::Cursor::new(data), io::sink(), 64 * 1024);
        transfer.add_observer(|stats: TransferStats| renderer.on_stats(stats));
        transfer.start().expect("transfer failed");
    }

    let out = String::from_utf8(renderer.finish()).expect("utf8");
    let last_bar = ansi::strip(&out)
        .lines()
        .filter(|l| l.contains('|'))
        .last()
        .map(str::to_string)
        .expect("at least one bar line");
    assert!(last_bar.trim_start().starts_with("64.0 KiB |"), "got {:?}", last_bar);
    assert!(last_bar.ends_with("100%"));
}

#[test]
fn test_non_seekable_source_selects_spinner_without_cursor_probe() {
    // A pipe-like reader has no metadata, so its size hint is 0.
    let reader = io::Cursor::new(b"streamed bytes".to_vec()).chain(io::repeat(b'z').take(1000));

    let calls = Rc::new(Cell::new(0));
    let probe = RecordingProbe {
        cursor_calls: Rc::clone(&calls),
    };

    let mut term = Vec::new();
    let progress = Progress::new(0, Box::new(probe), &mut term).expect("progress");
    assert!(!progress.is_finite());
    assert_eq!(calls.get(), 0, "cursor must not be probed off-terminal");

    let mut renderer = TerminalRenderer::new(progress, Vec::new());
    let mut output = Vec::new();
    {
        let mut transfer = MonitoredTransfer::new(reader, &mut output, 0);
        transfer.add_observer(|stats: TransferStats| renderer.on_stats(stats));
        let stats = transfer.start().expect("transfer failed");
        assert_eq!(stats.transferred_bytes, 1014);
    }

    assert_eq!(output.len(), 1014);
    let frames = String::from_utf8(renderer.finish()).expect("utf8");
    assert!(ansi::strip(&frames).contains("transferring: 1014 B"));
}

#[test]
fn test_broken_output_still_reports_final_frame() {
    struct ClosedPipe {
        accepted: usize,
    }

    impl Write for ClosedPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.accepted >= 100 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            let n = buf.len().min(100 - self.accepted);
            self.accepted += n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let last = RefCell::new(None);
    let result = {
        let mut transfer =
            MonitoredTransfer::new(io::repeat(1).take(10_000), ClosedPipe { accepted: 0 }, 0);
        transfer.add_observer(|stats: TransferStats| *last.borrow_mut() = Some(stats.transferred_bytes));
        transfer.start()
    };

    let err = result.expect_err("write should fail");
    assert!(matches!(err, EngineError::Write { transferred: 100, .. }));
    assert_eq!(*last.borrow(), Some(100));
}
