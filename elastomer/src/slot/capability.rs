//! Type capabilities for erased slot values
//!
//! The archive stores every value as `Arc<dyn Any + Send + Sync>`. A slot
//! carries a capability captured from its payload type at construction,
//! which recovers the two type-specific questions the store needs to ask:
//! whether a value belongs in the slot, and whether two values are equal.

use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

/// A type-erased slot payload
pub type Value = Arc<dyn Any + Send + Sync>;

/// Erase a concrete value into a [`Value`]
pub fn erase<T: Any + Send + Sync>(value: T) -> Value {
    Arc::new(value)
}

/// Per-type predicates for one slot
///
/// `None` stands for the absent value. Both predicates must be pure:
/// they run on the sequencer thread and must not touch shared state.
pub trait SlotCapability: Send + Sync {
    /// Whether `value` is an acceptable payload
    fn accepts(&self, value: Option<&Value>) -> bool;

    /// Slot-specific equality
    fn equal(&self, a: Option<&Value>, b: Option<&Value>) -> bool;

    /// Payload type name for diagnostics
    fn type_name(&self) -> &'static str;
}

/// Capability derived from a concrete `PartialEq` type
pub struct TypedCapability<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedCapability<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedCapability<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotCapability for TypedCapability<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    fn accepts(&self, value: Option<&Value>) -> bool {
        // Absent clears the slot and is valid for every type
        value.map_or(true, |v| (**v).is::<T>())
    }

    fn equal(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => match ((**a).downcast_ref::<T>(), (**b).downcast_ref::<T>()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}
