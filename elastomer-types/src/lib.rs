//! Shared types for elastomer
//!
//! This crate provides the identity and handle types used across the
//! elastomer workspace: slot identities, observer receipts, commit
//! ordinals and commit timestamps.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::any::{type_name, TypeId};
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Identity of one storage slot
///
/// Two identities are equal when both the name and the payload type
/// match. A name reused with a different payload type is therefore a
/// different slot, never a shared cell.
#[derive(Clone)]
pub struct SlotId {
    name: Arc<str>,
    type_id: TypeId,
    type_name: &'static str,
}

impl SlotId {
    /// Identity of the slot `name` holding values of type `T`
    pub fn of<T: 'static>(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// The human-readable slot name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The payload type's id
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The payload type's name, for diagnostics only
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check whether this slot holds values of type `T`
    pub fn holds<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for SlotId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for SlotId {}

impl Hash for SlotId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.type_id.hash(state);
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({}: {})", self.name, self.type_name)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Serialize for SlotId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SlotId", 2)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("type", self.type_name)?;
        state.end()
    }
}

/// Observer receipt
///
/// Returned when an observer is registered, used to later retire it.
/// Receipts are unique for the lifetime of the process and can only be
/// issued by [`Receipt::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Receipt(u64);

static RECEIPT_COUNTER: AtomicU64 = AtomicU64::new(1);

impl Receipt {
    /// Issue a fresh receipt
    pub fn new() -> Self {
        Self(RECEIPT_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for Receipt {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rcpt:{}", self.0)
    }
}

/// Position of a commit in an archive's total order
///
/// Every committed write and every post is assigned the next ordinal,
/// so ordinals observed by one observer are strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitSeq(pub u64);

impl CommitSeq {
    /// The ordinal before any commit
    pub const GENESIS: CommitSeq = CommitSeq(0);

    pub fn next(self) -> CommitSeq {
        CommitSeq(self.0 + 1)
    }
}

impl Default for CommitSeq {
    fn default() -> Self {
        CommitSeq::GENESIS
    }
}

impl fmt::Display for CommitSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Moment a commit was applied to the store
///
/// `instant` is monotonic and is what ordering uses; `wall` is kept for
/// logs and display.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    pub instant: Instant,
    pub wall: DateTime<Utc>,
}

impl Timestamp {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: Utc::now(),
        }
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.instant.cmp(&other.instant)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wall.to_rfc3339())
    }
}
