//! Output wrapper that counts accepted bytes.
//!
//! The count lives behind a shared `ByteCounter` handle so the sampler can
//! read it from another thread while the copy loop is writing.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Something that exposes a monotonically increasing count.
pub trait ObservableCount {
    fn count(&self) -> u64;
}

/// Shared, read-consistent byte total.
///
/// Cloning yields another handle to the same total.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter {
    total: Arc<AtomicU64>,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last fully committed total.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    fn add(&self, n: u64) {
        self.total.fetch_add(n, Ordering::AcqRel);
    }
}

impl ObservableCount for ByteCounter {
    fn count(&self) -> u64 {
        self.total()
    }
}

/// Writer that forwards to `inner` and records every accepted byte.
pub struct CountingWriter<W> {
    inner: W,
    counter: ByteCounter,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        CountingWriter {
            inner,
            counter: ByteCounter::new(),
        }
    }

    /// Handle to the running total, readable from any thread.
    pub fn counter(&self) -> ByteCounter {
        self.counter.clone()
    }

    pub fn total(&self) -> u64 {
        self.counter.total()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // The write happens outside any synchronization; only the commit is atomic.
        let n = self.inner.write(buf)?;
        self.counter.add(n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
