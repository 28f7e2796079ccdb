//! The archive: a sequenced, observable slot store
//!
//! The archive manages:
//! - The value table (slot -> current value)
//! - The observer table (slot -> registrations)
//! - The sequencer that totally orders every access to both
//! - Fan-out of mutation events to delivery contexts
//!
//! Every public operation returns immediately. Writes, registrations and
//! retirements are submitted to the sequencer; reads deliver their result
//! through a delivery context or an awaitable helper.

mod batch;
mod sequencer;
mod store;

pub use batch::Snapshot;
pub use store::ArchiveStats;

use crate::config::ArchiveConfig;
use crate::delivery::{ContextRef, Scheduler, TokioScheduler};
use crate::error::{ArchiveError, Result};
use crate::event::MutationEvent;
use crate::slot::{Slot, SlotKey, SlotRegistry, Value};
use elastomer_types::{Receipt, SlotId};
use sequencer::Sequencer;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use store::{Callback, Registration, Store};
use tokio::sync::oneshot;

/// Options for a single write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOptions {
    /// Drop the write if it equals the stored value
    pub discard_redundant: bool,
    /// Submit the write after this delay instead of now
    pub delay: Option<Duration>,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            discard_redundant: true,
            delay: None,
        }
    }
}

impl StageOptions {
    /// Commit and notify even when the value is unchanged
    pub fn keep_redundant(mut self) -> Self {
        self.discard_redundant = false;
        self
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct Inner {
    config: ArchiveConfig,
    sequencer: Sequencer,
    scheduler: Arc<dyn Scheduler>,
    registry: SlotRegistry,
    rejected: AtomicU64,
}

/// Handle to an archive
///
/// Cloning is cheap and every clone addresses the same store. The
/// sequencer thread stops once the last handle is dropped. Handles held
/// by pending delayed writes count, and so do handles captured by
/// observer callbacks: the store keeps those callbacks alive, so an
/// archive with such an observer never stops on its own. Call
/// [`Archive::shutdown`] first to release them.
///
/// # Example
///
/// ```
/// use elastomer::{Archive, TaskContext};
///
/// # #[tokio::main]
/// # async fn main() -> elastomer::Result<()> {
/// let archive = Archive::with_defaults()?;
/// let count = archive.define_slot::<i32>("count")?;
///
/// let ui = TaskContext::spawn("ui");
/// let receipt = archive.observe(&count, &ui.context(), |event| {
///     println!("count: {:?} -> {:?}", event.old_value(), event.new_value());
/// });
///
/// archive.stage(&count, 1);
/// assert_eq!(archive.fetch(&count).await?.as_deref(), Some(&1));
///
/// archive.retire(receipt);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Archive {
    inner: Arc<Inner>,
}

impl Archive {
    /// Create an archive with timers on the current tokio runtime
    pub fn new(config: ArchiveConfig) -> Result<Self> {
        let scheduler = TokioScheduler::try_current()?;
        Self::with_scheduler(config, Arc::new(scheduler))
    }

    /// Create an archive with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(ArchiveConfig::default())
    }

    /// Create an archive with a host-provided scheduler for delayed writes
    pub fn with_scheduler(config: ArchiveConfig, scheduler: Arc<dyn Scheduler>) -> Result<Self> {
        config.validate()?;
        let sequencer = Sequencer::start(&config)?;
        tracing::debug!("archive {} created", config.name);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                sequencer,
                scheduler,
                registry: SlotRegistry::new(),
                rejected: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.inner.config
    }

    /// Define the slot `name` with payload type `T`
    ///
    /// Fails if `name` was already defined on this archive with another
    /// payload type.
    pub fn define_slot<T>(&self, name: impl Into<Arc<str>>) -> Result<Slot<T>>
    where
        T: PartialEq + Send + Sync + 'static,
    {
        self.inner.registry.define(name)
    }

    /// Write a value, dropping it if equal to the stored one
    ///
    /// Whether equal values are dropped follows `discard_redundant` in
    /// the archive configuration.
    pub fn stage<T>(&self, slot: &Slot<T>, value: impl Into<Option<T>>)
    where
        T: PartialEq + Send + Sync + 'static,
    {
        let options = StageOptions {
            discard_redundant: self.inner.config.discard_redundant,
            delay: None,
        };
        self.stage_with(slot, value, options);
    }

    /// Write a value with explicit options
    pub fn stage_with<T>(
        &self,
        slot: &Slot<T>,
        value: impl Into<Option<T>>,
        options: StageOptions,
    ) where
        T: PartialEq + Send + Sync + 'static,
    {
        let value = value.into().map(|v| Arc::new(v) as Value);
        self.stage_erased(slot.key(), value, options);
    }

    /// Write an erased value
    ///
    /// A value the slot does not accept is silently dropped: nothing is
    /// stored, nobody is notified, and the caller gets no signal.
    pub fn stage_erased(&self, key: &SlotKey, value: Option<Value>, options: StageOptions) {
        if !key.accepts(value.as_ref()) {
            self.inner.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "rejected write to {}: value is not a {}",
                key.id(),
                key.id().type_name()
            );
            return;
        }

        if let Some(delay) = options.delay {
            let archive = self.clone();
            let key = key.clone();
            let options = StageOptions {
                delay: None,
                ..options
            };
            self.inner.scheduler.schedule_after(
                delay,
                Box::new(move || archive.stage_erased(&key, value, options)),
            );
            return;
        }

        let key = key.clone();
        self.submit(move |store| {
            store.stage(&key, value, options.discard_redundant);
        });
    }

    /// Read a slot's current value
    ///
    /// The read is ordered with every other operation; the result is
    /// delivered on `context`, never on the sequencer.
    pub fn express<T, F>(&self, slot: &Slot<T>, context: &ContextRef, on_result: F)
    where
        T: Any + Send + Sync,
        F: FnOnce(Option<Arc<T>>) + Send + 'static,
    {
        let id = slot.id().clone();
        let context = context.clone();
        self.submit(move |store| {
            let value = store.get(&id).and_then(|v| v.downcast::<T>().ok());
            context.submit(Box::new(move || on_result(value)));
        });
    }

    /// Read a slot's current value without a delivery context
    pub async fn fetch<T>(&self, slot: &Slot<T>) -> Result<Option<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        let id = slot.id().clone();
        self.request(move |store| store.get(&id).and_then(|v| v.downcast::<T>().ok()))
            .await
    }

    /// Register an observer for a slot
    ///
    /// Returns immediately; the registration takes effect when the
    /// sequencer reaches it. A write submitted concurrently may or may not
    /// be observed.
    pub fn observe<T, F>(&self, slot: &Slot<T>, context: &ContextRef, on_mutation: F) -> Receipt
    where
        T: Any + Send + Sync,
        F: Fn(MutationEvent<T>) + Send + Sync + 'static,
    {
        let slot_name = slot.id().clone();
        self.observe_erased(slot, context, move |event: MutationEvent| {
            match event.downcast::<T>() {
                Some(event) => on_mutation(event),
                None => tracing::warn!("dropping mistyped event for {}", slot_name),
            }
        })
    }

    /// Register an observer receiving erased events
    pub fn observe_erased<K, F>(&self, slot: &K, context: &ContextRef, on_mutation: F) -> Receipt
    where
        K: AsRef<SlotKey> + ?Sized,
        F: Fn(MutationEvent) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(on_mutation);
        self.register(slot.as_ref().id().clone(), Some(context.clone()), Some(callback))
    }

    /// Register a silent observer that is never notified
    pub fn observe_silent<K>(&self, slot: &K) -> Receipt
    where
        K: AsRef<SlotKey> + ?Sized,
    {
        self.register(slot.as_ref().id().clone(), None, None)
    }

    /// Stop notifying an observer
    ///
    /// Unknown, already retired, and absent receipts are ignored.
    /// Events already handed to the observer's context still run.
    pub fn retire(&self, receipt: impl Into<Option<Receipt>>) {
        let Some(receipt) = receipt.into() else {
            return;
        };
        self.submit(move |store| {
            store.retire(receipt);
        });
    }

    /// Re-announce a slot's current value to its observers
    pub fn post<K>(&self, slot: &K)
    where
        K: AsRef<SlotKey> + ?Sized,
    {
        let id = slot.as_ref().id().clone();
        self.submit(move |store| {
            store.post(&id);
        });
    }

    /// Re-announce a slot's current value after a delay
    pub fn post_after<K>(&self, slot: &K, delay: Duration)
    where
        K: AsRef<SlotKey> + ?Sized,
    {
        let archive = self.clone();
        let key = slot.as_ref().clone();
        self.inner
            .scheduler
            .schedule_after(delay, Box::new(move || archive.post(&key)));
    }

    /// Wait until every operation submitted before this call has run
    ///
    /// Events those operations produced have been handed to their
    /// contexts, but may not have run yet.
    pub async fn flush(&self) -> Result<()> {
        self.request(|_store| ()).await
    }

    pub async fn stats(&self) -> Result<ArchiveStats> {
        let rejected = self.inner.rejected.load(Ordering::Relaxed);
        let mut stats = self.request(|store| store.stats()).await?;
        stats.rejected = rejected;
        Ok(stats)
    }

    /// Number of observers currently registered on a slot
    pub async fn observer_count<K>(&self, slot: &K) -> Result<usize>
    where
        K: AsRef<SlotKey> + ?Sized,
    {
        let id: SlotId = slot.as_ref().id().clone();
        self.request(move |store| store.observer_count(&id)).await
    }

    /// Retire every observer
    ///
    /// Drops all registered callbacks and their contexts, which breaks
    /// reference cycles through callbacks that hold an `Archive`. The
    /// archive stays usable; observers registered afterwards work as
    /// usual.
    pub fn shutdown(&self) {
        self.submit(|store| {
            let retired = store.retire_everything();
            tracing::debug!("retired {} observers on shutdown", retired);
        });
    }

    fn register(
        &self,
        slot: SlotId,
        context: Option<ContextRef>,
        callback: Option<Callback>,
    ) -> Receipt {
        let receipt = Receipt::new();
        self.submit(move |store| {
            store.register(
                slot,
                Registration {
                    receipt,
                    context,
                    callback,
                },
            );
        });
        receipt
    }

    fn submit<F>(&self, unit: F) -> bool
    where
        F: FnOnce(&mut Store) + Send + 'static,
    {
        self.inner.sequencer.submit(Box::new(unit))
    }

    /// Run a unit and await its result
    async fn request<R, F>(&self, unit: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Store) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(move |store| {
            let _ = tx.send(unit(store));
        });
        rx.await.map_err(|_| ArchiveError::SequencerClosed)
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("name", &self.inner.config.name)
            .field("slots_defined", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::TaskContext;
    use crate::slot::erase;

    #[test]
    fn test_new_requires_runtime() {
        let err = Archive::with_defaults().unwrap_err();
        assert!(matches!(err, ArchiveError::NoRuntime(_)));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = ArchiveConfig {
            sequencer_thread: String::new(),
            ..ArchiveConfig::default()
        };
        let err = Archive::new(config).unwrap_err();
        assert!(matches!(err, ArchiveError::Config(_)));
    }

    #[tokio::test]
    async fn test_define_slot_conflict() {
        let archive = Archive::with_defaults().unwrap();
        archive.define_slot::<i32>("count").unwrap();

        let err = archive.define_slot::<String>("count").unwrap_err();
        assert!(matches!(err, ArchiveError::SlotTypeConflict { .. }));
    }

    #[tokio::test]
    async fn test_stage_and_fetch() {
        let archive = Archive::with_defaults().unwrap();
        let slot = archive.define_slot::<String>("title").unwrap();

        assert_eq!(archive.fetch(&slot).await.unwrap(), None);

        archive.stage(&slot, "hello".to_string());
        let value = archive.fetch(&slot).await.unwrap();
        assert_eq!(value.as_deref().map(String::as_str), Some("hello"));

        archive.stage(&slot, None);
        assert_eq!(archive.fetch(&slot).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_express_delivers_on_context() {
        let archive = Archive::with_defaults().unwrap();
        let slot = archive.define_slot::<u32>("level").unwrap();
        let ctx = TaskContext::spawn("reader");

        archive.stage(&slot, 4);
        let (tx, rx) = oneshot::channel();
        archive.express(&slot, &ctx.context(), move |value| {
            let thread = std::thread::current().name().map(str::to_string);
            let _ = tx.send((value, thread));
        });

        let (value, thread) = rx.await.unwrap();
        assert_eq!(value.as_deref(), Some(&4));
        assert_ne!(thread.as_deref(), Some(archive.config().sequencer_thread.as_str()));
    }

    #[tokio::test]
    async fn test_retire_absent_receipt_is_noop() {
        let archive = Archive::with_defaults().unwrap();
        archive.retire(None);
        archive.retire(Receipt::new());
        archive.flush().await.unwrap();
        assert_eq!(archive.stats().await.unwrap().observer_count, 0);
    }

    #[tokio::test]
    async fn test_stats_count_rejections() {
        let archive = Archive::with_defaults().unwrap();
        let slot = archive.define_slot::<i32>("count").unwrap();

        archive.stage_erased(slot.key(), Some(Arc::new("nope")), StageOptions::default());
        archive.stage(&slot, 1);
        archive.stage(&slot, 1);

        let stats = archive.stats().await.unwrap();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.slot_count, 1);
    }

    #[tokio::test]
    async fn test_config_disables_redundancy_filter() {
        let config = ArchiveConfig {
            discard_redundant: false,
            ..ArchiveConfig::default()
        };
        let archive = Archive::new(config).unwrap();
        let slot = archive.define_slot::<i32>("count").unwrap();

        archive.stage(&slot, 1);
        archive.stage(&slot, 1);

        assert_eq!(archive.stats().await.unwrap().commits, 2);
    }

    #[tokio::test]
    async fn test_foreign_typed_write_is_rejected() {
        let archive = Archive::with_defaults().unwrap();
        let count = archive.define_slot::<i32>("count").unwrap();
        archive.stage(&count, 1);

        let key: SlotKey = count.clone().into();
        let value = Some(erase("two".to_string()));
        archive.stage_erased(&key, value.clone(), StageOptions::default());

        // Same name, other type: a separate cell, not a write into `count`
        let text: Slot<String> = Slot::new("count");
        archive.stage_erased(text.key(), value, StageOptions::default());

        assert_eq!(archive.fetch(&count).await.unwrap().as_deref(), Some(&1));
        let stats = archive.stats().await.unwrap();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.commits, 2);
    }

    #[tokio::test]
    async fn test_shutdown_releases_callbacks() {
        let archive = Archive::with_defaults().unwrap();
        let source = archive.define_slot::<i32>("source").unwrap();
        let derived = archive.define_slot::<i32>("derived").unwrap();
        let ctx = TaskContext::spawn("derive");
        let token = Arc::new(());

        let (handle, held) = (archive.clone(), token.clone());
        archive.observe(&source, &ctx.context(), move |event| {
            let _held = &held;
            handle.stage(&derived, event.new_value().map(|v| v * 2));
        });
        archive.flush().await.unwrap();
        assert_eq!(Arc::strong_count(&token), 2);

        archive.shutdown();
        archive.flush().await.unwrap();

        assert_eq!(Arc::strong_count(&token), 1);
        assert_eq!(archive.stats().await.unwrap().observer_count, 0);
    }

    #[test]
    fn test_stage_options_builder() {
        let options = StageOptions::default()
            .keep_redundant()
            .after(Duration::from_millis(5));
        assert!(!options.discard_redundant);
        assert_eq!(options.delay, Some(Duration::from_millis(5)));
    }
}
