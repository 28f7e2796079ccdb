//! Mutation events delivered to observers

use elastomer_types::{CommitSeq, Receipt, SlotId, Timestamp};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The erased payload type
pub type ErasedValue = dyn Any + Send + Sync;

/// What produced a mutation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// A committed write
    Staged,
    /// A re-announcement of the current value; `old` and `new` are the same
    Posted,
}

/// One observed transition of one slot, addressed to one observer
///
/// If N observers watch a slot, a commit produces N events that differ
/// only in `receipt`. `timestamp` is taken when the commit was applied,
/// not when the event is delivered. Absent values are `None`.
pub struct MutationEvent<T: ?Sized + Send + Sync + 'static = ErasedValue> {
    pub slot: SlotId,
    pub receipt: Receipt,
    pub old: Option<Arc<T>>,
    pub new: Option<Arc<T>>,
    pub seq: CommitSeq,
    pub timestamp: Timestamp,
    pub kind: MutationKind,
}

impl<T: ?Sized + Send + Sync + 'static> MutationEvent<T> {
    pub fn old_value(&self) -> Option<&T> {
        self.old.as_deref()
    }

    pub fn new_value(&self) -> Option<&T> {
        self.new.as_deref()
    }

    pub fn is_post(&self) -> bool {
        self.kind == MutationKind::Posted
    }
}

impl MutationEvent {
    /// Recover the typed event
    ///
    /// Returns `None` if either value is not a `T`.
    pub fn downcast<T: Any + Send + Sync>(self) -> Option<MutationEvent<T>> {
        let old = match self.old {
            Some(v) => Some(v.downcast::<T>().ok()?),
            None => None,
        };
        let new = match self.new {
            Some(v) => Some(v.downcast::<T>().ok()?),
            None => None,
        };

        Some(MutationEvent {
            slot: self.slot,
            receipt: self.receipt,
            old,
            new,
            seq: self.seq,
            timestamp: self.timestamp,
            kind: self.kind,
        })
    }
}

impl<T: ?Sized + Send + Sync + 'static> Clone for MutationEvent<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            receipt: self.receipt,
            old: self.old.clone(),
            new: self.new.clone(),
            seq: self.seq,
            timestamp: self.timestamp,
            kind: self.kind,
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> fmt::Debug for MutationEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationEvent")
            .field("slot", &self.slot)
            .field("receipt", &self.receipt)
            .field("seq", &self.seq)
            .field("kind", &self.kind)
            .field("has_old", &self.old.is_some())
            .field("has_new", &self.new.is_some())
            .finish_non_exhaustive()
    }
}
