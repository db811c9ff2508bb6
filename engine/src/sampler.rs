//! Periodic sampler.
//!
//! A `Sampler` owns one background ticker thread. Every period it reads an
//! `ObservableCount` and pushes the value into a bounded channel. `stop()`
//! ends the thread and the channel closes when the thread drops its sender,
//! so the channel is closed exactly once no matter how often `stop()` runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use crate::counting::ObservableCount;

/// Fixed sampling period used by the transfer engine.
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(100);

/// Samples buffered before the ticker starts dropping them.
const SAMPLE_BACKLOG: usize = 100;

pub struct Sampler {
    stopped: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sampler {
    pub fn new() -> Self {
        Sampler {
            stopped: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            handle: None,
        }
    }

    /// Start sampling `source` every `period`.
    ///
    /// A sampler runs at most once. Calling this on a sampler that is already
    /// running or has been stopped returns an already-closed receiver.
    pub fn sample<S>(&mut self, period: Duration, source: S) -> Receiver<u64>
    where
        S: ObservableCount + Send + 'static,
    {
        let (sample_tx, sample_rx) = bounded(SAMPLE_BACKLOG);
        if self.handle.is_some() || self.is_stopped() {
            return sample_rx;
        }

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let stopped = Arc::clone(&self.stopped);
        let ticker = tick(period);

        let spawned = thread::Builder::new()
            .name("pipemon-sampler".to_string())
            .spawn(move || {
                'ticking: loop {
                    select! {
                        recv(ticker) -> _ => {
                            if stopped.load(Ordering::Acquire) {
                                break 'ticking;
                            }
                            // A full backlog drops this sample; the next tick carries a newer total.
                            if let Err(TrySendError::Disconnected(_)) = sample_tx.try_send(source.count()) {
                                break 'ticking;
                            }
                        }
                        recv(stop_rx) -> _ => break 'ticking,
                    }
                }
                debug!("sampler thread exiting");
            });

        match spawned {
            Ok(handle) => {
                debug!(period_ms = period.as_millis() as u64, "sampler started");
                self.stop_tx = Some(stop_tx);
                self.handle = Some(handle);
            }
            Err(e) => {
                warn!(error = %e, "could not spawn sampler thread; only the final sample will be reported");
            }
        }

        sample_rx
    }

    /// Stop the ticker and wait for its thread to exit.
    ///
    /// Safe to call on a sampler that never started, and safe to call twice.
    pub fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        // Dropping the only stop sender wakes the ticker's select.
        drop(self.stop_tx.take());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("sampler thread panicked");
            }
            debug!("sampler stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}
