//! Slot descriptors
//!
//! A slot is a named, typed storage location inside an archive. This
//! module provides:
//! - `Slot<T>`: the typed descriptor application code holds
//! - `SlotKey`: its type-erased form, used by batch operations over
//!   slots of different payload types
//! - `SlotCapability`: the per-type predicates captured at construction
//! - `SlotRegistry`: name bookkeeping that rejects a name reused with a
//!   different payload type

mod capability;
mod registry;

pub use capability::{erase, SlotCapability, TypedCapability, Value};
pub use registry::SlotRegistry;

use elastomer_types::SlotId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased slot descriptor
///
/// Equality and hashing use the slot identity only.
#[derive(Clone)]
pub struct SlotKey {
    id: SlotId,
    capability: Arc<dyn SlotCapability>,
}

impl SlotKey {
    pub fn id(&self) -> &SlotId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }

    /// Whether `value` may be staged into this slot
    ///
    /// The value must be of the payload type recorded in the slot
    /// identity as well as pass the capability.
    pub fn accepts(&self, value: Option<&Value>) -> bool {
        let matches_id = value.map_or(true, |v| (**v).type_id() == self.id.type_id());
        matches_id && self.capability.accepts(value)
    }

    /// Slot-specific equality of two payloads
    pub fn values_equal(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        self.capability.equal(a, b)
    }
}

impl PartialEq for SlotKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SlotKey {}

impl Hash for SlotKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotKey")
            .field("id", &self.id)
            .field("capability", &self.capability.type_name())
            .finish()
    }
}

impl AsRef<SlotKey> for SlotKey {
    fn as_ref(&self) -> &SlotKey {
        self
    }
}

/// Typed slot descriptor
///
/// Created once per slot and reused; cloning is cheap. Two descriptors
/// with the same name and payload type address the same storage cell.
///
/// ```
/// use elastomer::Slot;
///
/// let count: Slot<i32> = Slot::new("count");
/// assert_eq!(count.name(), "count");
/// assert_eq!(count, Slot::<i32>::new("count"));
/// ```
pub struct Slot<T> {
    key: SlotKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Slot<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// Describe the slot `name` holding values of type `T`
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            key: SlotKey {
                id: SlotId::of::<T>(name),
                capability: Arc::new(TypedCapability::<T>::new()),
            },
            _marker: PhantomData,
        }
    }
}

impl<T> Slot<T> {
    pub fn id(&self) -> &SlotId {
        &self.key.id
    }

    pub fn name(&self) -> &str {
        self.key.name()
    }

    /// The erased descriptor for batch operations
    pub fn key(&self) -> &SlotKey {
        &self.key
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Slot<T> {}

impl<T> Hash for Slot<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({:?})", self.key.id)
    }
}

impl<T> AsRef<SlotKey> for Slot<T> {
    fn as_ref(&self) -> &SlotKey {
        &self.key
    }
}

impl<T> From<Slot<T>> for SlotKey {
    fn from(slot: Slot<T>) -> Self {
        slot.key
    }
}
