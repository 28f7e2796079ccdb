//! Deferred execution

use super::Job;
use std::time::Duration;
use tokio::runtime::Handle;

/// Runs a job after a delay
///
/// Delays are best effort: a job never runs early, but may run late.
pub trait Scheduler: Send + Sync {
    fn schedule_after(&self, delay: Duration, job: Job);
}

/// Scheduler backed by tokio timers
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on
    pub fn try_current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, job: Job) {
        if delay.is_zero() {
            job();
            return;
        }
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            job();
        });
    }
}
