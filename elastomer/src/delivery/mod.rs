//! Delivery contexts and deferred scheduling
//!
//! The archive never runs consumer code on its sequencer. Observer
//! callbacks and read results are handed to a [`DeliveryContext`] chosen
//! by the caller; timed stages and posts go through a [`Scheduler`].
//!
//! - `DeliveryContext`: in-order, single-context job execution
//! - `TaskContext`: default context backed by one tokio task
//! - `Scheduler` / `TokioScheduler`: run a job after a delay

mod scheduler;
mod task;

pub use scheduler::{Scheduler, TokioScheduler};
pub use task::TaskContext;

use std::sync::Arc;

/// A unit of consumer work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to a delivery context
pub type ContextRef = Arc<dyn DeliveryContext>;

/// Execution context for observer callbacks and read results
///
/// Implementations must run submitted jobs one at a time, in submission
/// order, and never on the thread that called `submit` when that thread
/// is the archive's sequencer. `submit` itself must not block.
pub trait DeliveryContext: Send + Sync {
    /// Queue a job for execution
    fn submit(&self, job: Job);

    /// Name used in log lines
    fn label(&self) -> &str {
        "delivery"
    }
}
