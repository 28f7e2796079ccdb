//! Tokio-task delivery context

use super::{ContextRef, DeliveryContext, Job};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

enum Envelope {
    Run(Job),
    Flush(oneshot::Sender<()>),
}

/// Delivery context backed by a single tokio task
///
/// Jobs are drained from an unbounded queue by one task, so they run one
/// at a time in submission order. The queue is deliberately unbounded:
/// the sequencer must never wait on a consumer, so there is no
/// back-pressure and a slow consumer only grows its own queue.
///
/// The task stops once every clone of the context, including the ones
/// held by observer registrations, has been dropped.
#[derive(Clone)]
pub struct TaskContext {
    label: Arc<str>,
    tx: mpsc::UnboundedSender<Envelope>,
    pending: Arc<AtomicUsize>,
}

impl TaskContext {
    /// Spawn a context on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(label: impl Into<Arc<str>>) -> Self {
        Self::spawn_on(label, &Handle::current())
    }

    /// Spawn a context on the given runtime
    pub fn spawn_on(label: impl Into<Arc<str>>, handle: &Handle) -> Self {
        let label = label.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        handle.spawn(drain(label.clone(), rx, pending.clone()));

        Self { label, tx, pending }
    }

    /// Shared handle for passing to the archive
    pub fn context(&self) -> ContextRef {
        Arc::new(self.clone())
    }

    /// Jobs queued but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until every job submitted before this call has run
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Envelope::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl DeliveryContext for TaskContext {
    fn submit(&self, job: Job) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Envelope::Run(job)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!("delivery context {} is gone, dropping job", self.label);
        }
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("label", &self.label)
            .field("pending", &self.pending())
            .finish()
    }
}

async fn drain(
    label: Arc<str>,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Run(job) => {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!("job panicked on delivery context {}", label);
                }
                pending.fetch_sub(1, Ordering::SeqCst);
            }
            Envelope::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::trace!("delivery context {} closed", label);
}
