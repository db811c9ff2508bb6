//! Monitored transfer.
//!
//! `MonitoredTransfer::start` copies the input into a `CountingWriter` on a
//! scoped worker thread while the calling thread waits on two channels: the
//! sampler's ticks and the copy's completion. Each tick becomes a
//! `TransferStats` delivered to the observers on the calling thread. When the
//! copy ends, successfully or not, the sampler is stopped and one final
//! notification carries the true byte count.

use std::fs::Metadata;
use std::io::{self, Read, Write};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, select};
use tracing::{debug, warn};

use crate::config::TransferConfig;
use crate::counting::{ByteCounter, CountingWriter};
use crate::error::EngineError;
use crate::model::{TransferState, TransferStats};
use crate::observer::{ObserverRegistry, TransferObserver};
use crate::sampler::Sampler;

/// Size hint for an input: its length when it is a regular file, otherwise 0.
pub fn size_hint(metadata: &Metadata) -> u64 {
    if metadata.is_file() {
        metadata.len()
    } else {
        0
    }
}

/// A single linear copy from `reader` to `writer` with progress sampling.
pub struct MonitoredTransfer<'a, R, W> {
    reader: R,
    writer: CountingWriter<W>,
    total_size: u64,
    config: TransferConfig,
    observers: ObserverRegistry<'a>,
    state: TransferState,
}

impl<'a, R, W> MonitoredTransfer<'a, R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    /// `total_size` is a hint; 0 means unknown.
    pub fn new(reader: R, writer: W, total_size: u64) -> Self {
        Self::with_config(reader, writer, total_size, TransferConfig::default())
    }

    pub fn with_config(reader: R, writer: W, total_size: u64, config: TransferConfig) -> Self {
        MonitoredTransfer {
            reader,
            writer: CountingWriter::new(writer),
            total_size,
            config,
            observers: ObserverRegistry::new(),
            state: TransferState::Pending,
        }
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Handle to the live byte count.
    pub fn counter(&self) -> ByteCounter {
        self.writer.counter()
    }

    /// Register an observer. Observers are called in registration order.
    pub fn add_observer<O>(&mut self, observer: O)
    where
        O: TransferObserver + 'a,
    {
        self.observers.add(observer);
    }

    /// Run the transfer to completion.
    ///
    /// Blocks until the input reaches end-of-stream or an I/O error occurs.
    /// In both cases observers receive a final notification with the bytes
    /// actually written before this returns.
    pub fn start(&mut self) -> Result<TransferStats, EngineError> {
        if self.state != TransferState::Pending {
            return Err(EngineError::AlreadyStarted { state: self.state });
        }
        self.state = TransferState::Running;

        let started = Instant::now();
        debug!(total_size = self.total_size, "transfer started");

        let counter = self.writer.counter();
        let mut sampler = Sampler::new();
        let samples = sampler.sample(self.config.sample_period, counter.clone());

        let buffer_size = self.config.buffer_size;
        let reader = &mut self.reader;
        let writer = &mut self.writer;
        let observers = &mut self.observers;

        let outcome = thread::scope(|scope| {
            let (done_tx, done_rx) = bounded(1);
            scope.spawn(move || {
                let _ = done_tx.send(copy_stream(reader, writer, buffer_size));
            });

            let finished = 'wait: loop {
                select! {
                    recv(samples) -> sample => match sample {
                        Ok(bytes) => observers.notify(TransferStats::new(bytes, started.elapsed())),
                        // No ticker; wait for the copy alone.
                        Err(_) => break 'wait done_rx.recv(),
                    },
                    recv(done_rx) -> result => break 'wait result,
                }
            };

            finished.unwrap_or_else(|_| {
                Err(EngineError::Write {
                    transferred: counter.total(),
                    source: io::Error::new(io::ErrorKind::Other, "copy thread exited without a result"),
                })
            })
        });

        sampler.stop();

        let final_stats = TransferStats::new(counter.total(), started.elapsed());
        self.observers.notify(final_stats);
        self.state = TransferState::Completed;

        match &outcome {
            Ok(bytes) => debug!(bytes, elapsed_ms = final_stats.elapsed.as_millis() as u64, "transfer finished"),
            Err(e) => warn!(error = %e, "transfer aborted"),
        }

        outcome.map(|_| final_stats)
    }

    /// Consume the transfer and return the output.
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

/// Copy until end-of-stream, then flush. Returns the bytes written.
fn copy_stream<R, W>(
    reader: &mut R,
    writer: &mut CountingWriter<W>,
    buffer_size: usize,
) -> Result<u64, EngineError>
where
    R: Read,
    W: Write,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(EngineError::Read {
                    transferred: writer.total(),
                    source: e,
                })
            }
        };

        writer
            .write_all(&buf[..n])
            .map_err(|e| EngineError::Write {
                transferred: writer.total(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| EngineError::Flush {
        transferred: writer.total(),
        source: e,
    })?;

    Ok(writer.total())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::time::Duration;

    fn slow_config() -> TransferConfig {
        TransferConfig {
            sample_period: Duration::from_secs(60),
            ..TransferConfig::default()
        }
    }

    /// Yields `chunks` chunks of `chunk_len` bytes, sleeping before each.
    struct ThrottledReader {
        chunks: usize,
        chunk_len: usize,
        delay: Duration,
    }

    impl Read for ThrottledReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks == 0 {
                return Ok(0);
            }
            self.chunks -= 1;
            thread::sleep(self.delay);
            let n = self.chunk_len.min(buf.len());
            buf[..n].fill(b'x');
            Ok(n)
        }
    }

    /// Yields `good` bytes, then fails.
    struct BrokenReader {
        good: usize,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.good == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "device gone"));
            }
            let n = self.good.min(buf.len());
            buf[..n].fill(b'y');
            self.good -= n;
            Ok(n)
        }
    }

    /// Accepts `capacity` bytes, then fails.
    struct FullWriter {
        capacity: usize,
        written: usize,
    }

    impl Write for FullWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity - self.written;
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader closed"));
            }
            let n = room.min(buf.len());
            self.written += n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_copies_data_verbatim() {
        let input: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let mut transfer = MonitoredTransfer::new(Cursor::new(input.clone()), Vec::new(), 0);

        let stats = transfer.start().expect("transfer failed");
        assert_eq!(stats.transferred_bytes, 100_000);
        assert_eq!(transfer.state(), TransferState::Completed);
        assert_eq!(transfer.into_writer(), input);
    }

    #[test]
    fn test_one_byte_input_yields_single_final_notification() {
        let seen = RefCell::new(Vec::new());
        let mut transfer =
            MonitoredTransfer::with_config(Cursor::new(vec![7u8]), Vec::new(), 1, slow_config());
        transfer.add_observer(|stats: TransferStats| seen.borrow_mut().push(stats.transferred_bytes));

        transfer.start().expect("transfer failed");
        drop(transfer);

        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn test_empty_input() {
        let seen = RefCell::new(Vec::new());
        let mut transfer = MonitoredTransfer::new(io::empty(), Vec::new(), 0);
        transfer.add_observer(|stats: TransferStats| seen.borrow_mut().push(stats.transferred_bytes));

        let stats = transfer.start().expect("transfer failed");
        drop(transfer);

        assert_eq!(stats.transferred_bytes, 0);
        assert_eq!(seen.borrow().last(), Some(&0));
    }

    #[test]
    fn test_periodic_notifications_are_monotonic() {
        let seen = RefCell::new(Vec::new());
        let reader = ThrottledReader {
            chunks: 30,
            chunk_len: 1000,
            delay: Duration::from_millis(5),
        };
        let config = TransferConfig {
            sample_period: Duration::from_millis(10),
            ..TransferConfig::default()
        };
        let mut transfer = MonitoredTransfer::with_config(reader, io::sink(), 0, config);
        transfer.add_observer(|stats: TransferStats| seen.borrow_mut().push(stats));

        transfer.start().expect("transfer failed");
        drop(transfer);

        let seen = seen.into_inner();
        assert!(seen.len() >= 2, "expected intermediate notifications, got {}", seen.len());
        assert!(seen
            .windows(2)
            .all(|w| w[0].transferred_bytes <= w[1].transferred_bytes));
        assert!(seen.windows(2).all(|w| w[0].elapsed <= w[1].elapsed));
        assert_eq!(seen.last().map(|s| s.transferred_bytes), Some(30_000));
    }

    #[test]
    fn test_read_error_still_notifies_final_count() {
        let seen = RefCell::new(Vec::new());
        let mut transfer =
            MonitoredTransfer::with_config(BrokenReader { good: 10 }, Vec::new(), 0, slow_config());
        transfer.add_observer(|stats: TransferStats| seen.borrow_mut().push(stats.transferred_bytes));

        let err = transfer.start().expect_err("read should fail");
        assert!(matches!(err, EngineError::Read { transferred: 10, .. }));
        assert_eq!(transfer.state(), TransferState::Completed);
        drop(transfer);

        assert_eq!(*seen.borrow(), vec![10]);
    }

    #[test]
    fn test_write_error_still_notifies_final_count() {
        let seen = RefCell::new(Vec::new());
        let writer = FullWriter { capacity: 1500, written: 0 };
        let mut transfer =
            MonitoredTransfer::with_config(Cursor::new(vec![0u8; 4096]), writer, 4096, slow_config());
        transfer.add_observer(|stats: TransferStats| seen.borrow_mut().push(stats.transferred_bytes));

        let err = transfer.start().expect_err("write should fail");
        assert_eq!(err.transferred(), Some(1500));
        drop(transfer);

        assert_eq!(*seen.borrow(), vec![1500]);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut transfer = MonitoredTransfer::new(Cursor::new(b"abc".to_vec()), Vec::new(), 3);
        transfer.start().expect("first start");

        let err = transfer.start().expect_err("second start");
        assert!(matches!(
            err,
            EngineError::AlreadyStarted { state: TransferState::Completed }
        ));
    }

    #[test]
    fn test_observers_called_in_order() {
        let calls = RefCell::new(Vec::new());
        let mut transfer =
            MonitoredTransfer::with_config(Cursor::new(vec![1u8; 8]), Vec::new(), 8, slow_config());
        transfer.add_observer(|_: TransferStats| calls.borrow_mut().push("first"));
        transfer.add_observer(|_: TransferStats| calls.borrow_mut().push("second"));

        transfer.start().expect("transfer failed");
        drop(transfer);

        assert_eq!(*calls.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_size_hint_for_regular_file() {
        let file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        std::fs::write(file.path(), b"12345").expect("Failed to write file");
        let metadata = std::fs::metadata(file.path()).expect("metadata");
        assert_eq!(size_hint(&metadata), 5);

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let metadata = std::fs::metadata(dir.path()).expect("metadata");
        assert_eq!(size_hint(&metadata), 0);
    }
}
