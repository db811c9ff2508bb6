//! Transfer observers.
//!
//! This module decouples the transfer engine from whatever displays progress.
//! Observers are called synchronously on the thread that runs
//! `MonitoredTransfer::start`, never on the copy or sampler threads, so an
//! observer can own mutable renderer state without locking.

use crate::model::TransferStats;

/// Receives transfer snapshots.
///
/// Any `FnMut(TransferStats)` closure is an observer.
pub trait TransferObserver {
    /// Called for every periodic sample and once more when the copy finishes.
    fn on_stats(&mut self, stats: TransferStats);
}

impl<F> TransferObserver for F
where
    F: FnMut(TransferStats),
{
    fn on_stats(&mut self, stats: TransferStats) {
        self(stats)
    }
}

/// Ordered list of observers; insertion order is call order.
#[derive(Default)]
pub struct ObserverRegistry<'a> {
    observers: Vec<Box<dyn TransferObserver + 'a>>,
}

impl<'a> ObserverRegistry<'a> {
    pub fn new() -> Self {
        ObserverRegistry {
            observers: Vec::new(),
        }
    }

    pub fn add<O>(&mut self, observer: O)
    where
        O: TransferObserver + 'a,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn notify(&mut self, stats: TransferStats) {
        for observer in self.observers.iter_mut() {
            observer.on_stats(stats);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
