//! The single serialization point of an archive
//!
//! One dedicated OS thread owns the [`Store`] and runs units of work
//! from an unbounded FIFO queue, one at a time and to completion. Every
//! read, write, registration and retirement goes through here, which
//! gives the archive a total order over all its operations.

use super::store::Store;
use crate::config::ArchiveConfig;
use crate::error::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// A unit of work run against the store
pub(crate) type Unit = Box<dyn FnOnce(&mut Store) + Send + 'static>;

pub(crate) struct Sequencer {
    tx: mpsc::UnboundedSender<Unit>,
    thread: String,
}

impl Sequencer {
    /// Start the sequencer thread
    ///
    /// The thread exits once the `Sequencer` is dropped and the queue has
    /// been drained.
    pub fn start(config: &ArchiveConfig) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let archive = config.name.clone();
        let slow_unit = config.slow_unit_threshold();

        std::thread::Builder::new()
            .name(config.sequencer_thread.clone())
            .spawn(move || run(archive, rx, slow_unit))?;

        Ok(Self {
            tx,
            thread: config.sequencer_thread.clone(),
        })
    }

    /// Enqueue a unit; returns false if the sequencer has stopped
    pub fn submit(&self, unit: Unit) -> bool {
        if self.tx.send(unit).is_err() {
            tracing::warn!("sequencer {} has stopped, dropping unit", self.thread);
            return false;
        }
        true
    }
}

fn run(archive: String, mut rx: mpsc::UnboundedReceiver<Unit>, slow_unit: Option<Duration>) {
    tracing::debug!("sequencer for {} started", archive);
    let mut store = Store::new();

    while let Some(unit) = rx.blocking_recv() {
        let started = Instant::now();

        // A panicking unit (e.g. a panicking PartialEq) must not take the
        // archive down with it
        if catch_unwind(AssertUnwindSafe(|| unit(&mut store))).is_err() {
            tracing::error!("unit panicked on sequencer for {}", archive);
        }

        if let Some(limit) = slow_unit {
            let elapsed = started.elapsed();
            if elapsed > limit {
                tracing::warn!(
                    "slow unit on {}: {:?} (threshold {:?})",
                    archive,
                    elapsed,
                    limit
                );
            }
        }
    }

    tracing::debug!("sequencer for {} stopped at {}", archive, store.seq());
}
