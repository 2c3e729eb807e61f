//! # Generation-Checked Handles
//!
//! A [`Handle`] names a node slot, not a memory address. It stays cheap to
//! copy and can never dangle: resolving it re-reads the slot's generation
//! and fails with [`HandleError::Stale`](crate::error::HandleError::Stale)
//! once the slot has been freed or handed to another node.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::memory::SlotAddress;

use super::registry::TypeId;

/// Non-owning, typed reference to a node of type `T`.
///
/// Handles never keep their target alive and say nothing about when it is
/// freed. Resolve them through
/// [`StorageManager::get`](super::StorageManager::get).
pub struct Handle<T> {
    type_id: TypeId,
    address: SlotAddress,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Creates a handle to the slot at `address`, captured at `generation`.
    #[inline]
    #[must_use]
    pub const fn new(type_id: TypeId, address: SlotAddress, generation: u32) -> Self {
        Self {
            type_id,
            address,
            generation,
            _marker: PhantomData,
        }
    }

    /// A handle bound to nothing. Always invalid.
    #[inline]
    #[must_use]
    pub const fn null() -> Self {
        Self::new(TypeId::from_raw(0), SlotAddress::new(0), 0)
    }

    /// Checks if this handle was never bound.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.type_id.raw() == 0
    }

    /// Identity of the node type this handle points into.
    #[inline]
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Slot inside the type's pool.
    #[inline]
    #[must_use]
    pub const fn address(&self) -> SlotAddress {
        self.address
    }

    /// Generation captured when the handle was made.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
            && self.address == other.address
            && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.address.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("Handle(null)");
        }
        write!(
            f,
            "Handle({} {} gen {})",
            self.type_id, self.address, self.generation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Player;

    #[test]
    fn test_null_handle() {
        let handle = Handle::<Player>::null();
        assert!(handle.is_null());
        assert_eq!(handle, Handle::default());
        assert_eq!(format!("{handle:?}"), "Handle(null)");
    }

    #[test]
    fn test_handles_compare_by_generation() {
        let a = Handle::<Player>::new(TypeId::from_raw(1), SlotAddress::new(4), 0);
        let b = Handle::<Player>::new(TypeId::from_raw(1), SlotAddress::new(4), 1);

        assert!(!a.is_null());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(format!("{b:?}"), "Handle(1 @4 gen 1)");
    }
}
