//! Slot name registry

use super::Slot;
use crate::error::{ArchiveError, Result};
use parking_lot::Mutex;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Records which payload type each slot name was defined with
///
/// Lives beside the store, not inside it: definition is synchronous and
/// never touches values or observers.
#[derive(Default)]
pub struct SlotRegistry {
    defined: Mutex<HashMap<Arc<str>, (TypeId, &'static str)>>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or re-obtain) the slot `name` with payload type `T`
    ///
    /// Redefining a name with the same type returns an equal descriptor.
    /// Redefining it with another type is an error.
    pub fn define<T>(&self, name: impl Into<Arc<str>>) -> Result<Slot<T>>
    where
        T: PartialEq + Send + Sync + 'static,
    {
        let name = name.into();
        let mut defined = self.defined.lock();

        match defined.get(&name).copied() {
            Some((type_id, _)) if type_id == TypeId::of::<T>() => {}
            Some((_, existing)) => {
                return Err(ArchiveError::SlotTypeConflict {
                    name: name.to_string(),
                    existing,
                    requested: type_name::<T>(),
                });
            }
            None => {
                tracing::debug!("defined slot {} as {}", name, type_name::<T>());
                defined.insert(name.clone(), (TypeId::of::<T>(), type_name::<T>()));
            }
        }

        Ok(Slot::new(name))
    }

    /// Payload type name a slot was defined with
    pub fn type_of(&self, name: &str) -> Option<&'static str> {
        self.defined.lock().get(name).map(|(_, type_name)| *type_name)
    }

    pub fn len(&self) -> usize {
        self.defined.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.defined.lock().is_empty()
    }
}
