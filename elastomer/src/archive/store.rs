//! Sequencer-owned value and observer tables
//!
//! Nothing in this module is shared: a `Store` is created on the
//! sequencer thread and only ever touched by units running there.

use crate::delivery::ContextRef;
use crate::event::{MutationEvent, MutationKind};
use crate::slot::{SlotKey, Value};
use elastomer_types::{CommitSeq, Receipt, SlotId, Timestamp};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Erased observer callback
pub(crate) type Callback = Arc<dyn Fn(MutationEvent) + Send + Sync>;

/// A registered observer
///
/// A registration without a callback is silent: it holds a receipt but
/// is never notified.
pub(crate) struct Registration {
    pub receipt: Receipt,
    pub context: Option<ContextRef>,
    pub callback: Option<Callback>,
}

impl Registration {
    fn deliverable(&self) -> Option<(&ContextRef, &Callback)> {
        match (&self.context, &self.callback) {
            (Some(context), Some(callback)) => Some((context, callback)),
            _ => None,
        }
    }
}

/// Result of applying one stage unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StageOutcome {
    Committed { seq: CommitSeq, notified: usize },
    Discarded,
}

/// Counters reported by `Archive::stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveStats {
    /// Slots currently holding a value
    pub slot_count: usize,
    /// Registered observers, silent ones included
    pub observer_count: usize,
    /// Committed writes
    pub commits: u64,
    /// Writes dropped as equal to the stored value
    pub discarded: u64,
    /// Writes dropped because the slot does not accept the value
    pub rejected: u64,
    /// Re-announcements
    pub posts: u64,
    /// Last ordinal handed out
    pub last_seq: CommitSeq,
}

#[derive(Default)]
pub(crate) struct Store {
    values: HashMap<SlotId, Value>,
    observers: HashMap<SlotId, HashMap<Receipt, Registration>>,
    receipts: HashMap<Receipt, SlotId>,
    seq: CommitSeq,
    commits: u64,
    discarded: u64,
    posts: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a slot; `None` when unset
    pub fn get(&self, slot: &SlotId) -> Option<Value> {
        self.values.get(slot).cloned()
    }

    /// Write a value and notify observers
    ///
    /// The caller has already checked `key.accepts(value)`.
    pub fn stage(
        &mut self,
        key: &SlotKey,
        value: Option<Value>,
        discard_redundant: bool,
    ) -> StageOutcome {
        let old = self.get(key.id());

        if discard_redundant && key.values_equal(old.as_ref(), value.as_ref()) {
            self.discarded += 1;
            tracing::trace!("discarded redundant write to {}", key.id());
            return StageOutcome::Discarded;
        }

        match &value {
            Some(v) => {
                self.values.insert(key.id().clone(), v.clone());
            }
            None => {
                self.values.remove(key.id());
            }
        }
        self.commits += 1;

        let seq = self.next_seq();
        let notified = self.notify(key.id(), old, value, seq, MutationKind::Staged);
        tracing::debug!("committed {} to {} ({} observers)", seq, key.id(), notified);

        StageOutcome::Committed { seq, notified }
    }

    /// Re-announce the current value without changing it
    pub fn post(&mut self, slot: &SlotId) -> usize {
        let current = self.get(slot);
        self.posts += 1;

        let seq = self.next_seq();
        let notified = self.notify(slot, current.clone(), current, seq, MutationKind::Posted);
        tracing::debug!("posted {} for {} ({} observers)", seq, slot, notified);
        notified
    }

    pub fn register(&mut self, slot: SlotId, registration: Registration) {
        tracing::trace!("registered {} on {}", registration.receipt, slot);
        self.receipts.insert(registration.receipt, slot.clone());
        self.observers
            .entry(slot)
            .or_default()
            .insert(registration.receipt, registration);
    }

    /// Remove a registration; returns false if the receipt is unknown
    pub fn retire(&mut self, receipt: Receipt) -> bool {
        let Some(slot) = self.receipts.remove(&receipt) else {
            return false;
        };

        if let Some(registrations) = self.observers.get_mut(&slot) {
            registrations.remove(&receipt);
            if registrations.is_empty() {
                self.observers.remove(&slot);
            }
        }
        tracing::trace!("retired {} from {}", receipt, slot);
        true
    }

    /// Remove every registration; returns how many were removed
    pub fn retire_everything(&mut self) -> usize {
        let retired = self.receipts.len();
        self.receipts.clear();
        self.observers.clear();
        retired
    }

    pub fn observer_count(&self, slot: &SlotId) -> usize {
        self.observers.get(slot).map_or(0, HashMap::len)
    }

    pub fn seq(&self) -> CommitSeq {
        self.seq
    }

    pub fn stats(&self) -> ArchiveStats {
        ArchiveStats {
            slot_count: self.values.len(),
            observer_count: self.receipts.len(),
            commits: self.commits,
            discarded: self.discarded,
            rejected: 0,
            posts: self.posts,
            last_seq: self.seq,
        }
    }

    fn next_seq(&mut self) -> CommitSeq {
        self.seq = self.seq.next();
        self.seq
    }

    /// Hand one event per deliverable observer to its context
    ///
    /// Submissions happen here, in commit order, so each observer sees
    /// events in the order commits were applied.
    fn notify(
        &self,
        slot: &SlotId,
        old: Option<Value>,
        new: Option<Value>,
        seq: CommitSeq,
        kind: MutationKind,
    ) -> usize {
        let Some(registrations) = self.observers.get(slot) else {
            return 0;
        };

        let timestamp = Timestamp::now();
        let mut notified = 0;

        for registration in registrations.values() {
            let Some((context, callback)) = registration.deliverable() else {
                continue;
            };

            let event = MutationEvent {
                slot: slot.clone(),
                receipt: registration.receipt,
                old: old.clone(),
                new: new.clone(),
                seq,
                timestamp,
                kind,
            };
            let callback = callback.clone();
            tracing::trace!(
                "dispatching {} to {} on {}",
                seq,
                registration.receipt,
                context.label()
            );
            context.submit(Box::new(move || callback(event)));
            notified += 1;
        }

        notified
    }
}
