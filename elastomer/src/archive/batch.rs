//! Operations over collections of slots
//!
//! Only `express_values` is atomic across slots: it reads every slot in
//! one sequencer unit. The other batch operations are plain iteration
//! over their single-slot counterparts, one unit per slot.

use super::store::{Callback, Store};
use super::{Archive, StageOptions};
use crate::delivery::ContextRef;
use crate::event::MutationEvent;
use crate::slot::{Slot, SlotKey, Value};
use elastomer_types::{CommitSeq, Receipt, SlotId};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Values of several slots as of one point in the total order
#[derive(Clone)]
pub struct Snapshot {
    seq: CommitSeq,
    entries: Vec<(SlotId, Option<Value>)>,
}

impl Snapshot {
    fn read(store: &Store, ids: Vec<SlotId>) -> Self {
        let entries = ids
            .into_iter()
            .map(|id| {
                let value = store.get(&id);
                (id, value)
            })
            .collect();
        Self {
            seq: store.seq(),
            entries,
        }
    }

    /// Ordinal of the last commit visible in this snapshot
    pub fn seq(&self) -> CommitSeq {
        self.seq
    }

    /// Typed value of a slot; `None` if unset or not part of the snapshot
    pub fn get<T: Any + Send + Sync>(&self, slot: &Slot<T>) -> Option<Arc<T>> {
        self.get_erased(slot.id())
            .and_then(|v| v.clone().downcast::<T>().ok())
    }

    pub fn get_erased(&self, slot: &SlotId) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(id, _)| id == slot)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn contains(&self, slot: &SlotId) -> bool {
        self.entries.iter().any(|(id, _)| id == slot)
    }

    /// Slot ids in request order
    pub fn ids(&self) -> impl Iterator<Item = &SlotId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("seq", &self.seq)
            .field("slots", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}

impl Archive {
    /// Read several slots atomically
    ///
    /// All values come from one sequencer unit, so no write can land
    /// between two of them. Duplicate slots are read once; the snapshot
    /// keeps the order of first appearance.
    pub fn express_values<I, K, F>(&self, slots: I, context: &ContextRef, on_result: F)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<SlotKey>,
        F: FnOnce(Snapshot) + Send + 'static,
    {
        let ids = unique_ids(slots);
        let context = context.clone();
        self.submit(move |store| {
            let snapshot = Snapshot::read(store, ids);
            context.submit(Box::new(move || on_result(snapshot)));
        });
    }

    /// Atomic multi-slot read without a delivery context
    pub async fn fetch_values<I, K>(&self, slots: I) -> crate::Result<Snapshot>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<SlotKey>,
    {
        let ids = unique_ids(slots);
        self.request(move |store| Snapshot::read(store, ids)).await
    }

    /// Observe every slot with one erased callback
    pub fn register_observers<I, K, F>(
        &self,
        slots: I,
        context: &ContextRef,
        on_mutation: F,
    ) -> HashMap<SlotId, Receipt>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<SlotKey>,
        F: Fn(MutationEvent) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(on_mutation);
        unique_ids(slots)
            .into_iter()
            .map(|id| {
                let receipt =
                    self.register(id.clone(), Some(context.clone()), Some(callback.clone()));
                (id, receipt)
            })
            .collect()
    }

    /// Register a silent observer on every slot
    pub fn register_silent<I, K>(&self, slots: I) -> HashMap<SlotId, Receipt>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<SlotKey>,
    {
        unique_ids(slots)
            .into_iter()
            .map(|id| {
                let receipt = self.register(id.clone(), None, None);
                (id, receipt)
            })
            .collect()
    }

    /// Retire every receipt in the map
    pub fn retire_all(&self, receipts: &HashMap<SlotId, Receipt>) {
        for receipt in receipts.values() {
            self.retire(*receipt);
        }
    }

    /// Stage each entry independently, with default options
    pub fn stage_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (SlotKey, Option<Value>)>,
    {
        let options = StageOptions {
            discard_redundant: self.inner.config.discard_redundant,
            delay: None,
        };
        self.stage_all_with(entries, options);
    }

    pub fn stage_all_with<I>(&self, entries: I, options: StageOptions)
    where
        I: IntoIterator<Item = (SlotKey, Option<Value>)>,
    {
        for (key, value) in entries {
            self.stage_erased(&key, value, options);
        }
    }
}

fn unique_ids<I, K>(slots: I) -> Vec<SlotId>
where
    I: IntoIterator<Item = K>,
    K: AsRef<SlotKey>,
{
    let mut seen = HashSet::new();
    slots
        .into_iter()
        .map(|slot| slot.as_ref().id().clone())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
