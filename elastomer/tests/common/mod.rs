//! Shared helpers for archive integration tests

#![allow(dead_code)]

use elastomer::{Archive, ContextRef, MutationEvent, Receipt, Slot, TaskContext};
use parking_lot::Mutex;
use std::sync::Arc;

/// Install a fmt subscriber once; honors RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An observer that records typed events on its own context
pub struct Recorder<T: Send + Sync + 'static> {
    pub task: TaskContext,
    pub receipt: Receipt,
    events: Arc<Mutex<Vec<MutationEvent<T>>>>,
}

impl<T> Recorder<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    pub fn attach(archive: &Archive, slot: &Slot<T>, label: &str) -> Self {
        let task = TaskContext::spawn(label.to_string());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let receipt = archive.observe(slot, &task.context(), move |event| sink.lock().push(event));
        Self {
            task,
            receipt,
            events,
        }
    }

    pub fn context(&self) -> ContextRef {
        self.task.context()
    }

    /// Wait until everything staged so far has been delivered
    pub async fn settle(&self, archive: &Archive) {
        archive.flush().await.unwrap();
        self.task.flush().await;
    }

    pub fn events(&self) -> Vec<MutationEvent<T>> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

impl<T> Recorder<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// (old, new) pairs in delivery order
    pub fn transitions(&self) -> Vec<(Option<T>, Option<T>)> {
        self.events
            .lock()
            .iter()
            .map(|e| (e.old_value().cloned(), e.new_value().cloned()))
            .collect()
    }
}
