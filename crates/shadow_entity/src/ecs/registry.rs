//! # Type Registry
//!
//! Lazily assigns each Rust type a small integer identity and remembers
//! how to store and print it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::column::ComponentInfo;
use super::node::Uuid;

/// Identity of a component type or of a relation.
///
/// - Lower 32 bits: type identity (nonzero once assigned)
/// - Upper 32 bits: zero for plain types, the target uuid for relations
///
/// Stable only for the lifetime of the registry that issued it; never
/// persist it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TypeId(u64);

impl TypeId {
    /// Creates a type id from its raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Builds the id of relation `kind` pointing at `target`.
    #[inline]
    #[must_use]
    pub const fn relation(kind: TypeId, target: Uuid) -> Self {
        Self(((target.get() as u64) << 32) | (kind.0 & 0xFFFF_FFFF))
    }

    /// Checks if this id tags a relation rather than a plain type.
    #[inline]
    #[must_use]
    pub const fn is_relation(self) -> bool {
        (self.0 >> 32) != 0
    }

    /// The type part: the type itself, or the relation kind.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> TypeId {
        Self(self.0 & 0xFFFF_FFFF)
    }

    /// The relation target, if this is a relation.
    #[inline]
    #[must_use]
    pub const fn target(self) -> Option<Uuid> {
        if self.is_relation() {
            Some(Uuid::new((self.0 >> 32) as u32))
        } else {
            None
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target() {
            Some(target) => write!(f, "{}:{}", self.kind().0, target.get()),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Relation kind tying a node to its parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChildOf;

#[derive(Debug, Default)]
struct RegistryInner {
    ids: HashMap<std::any::TypeId, TypeId>,
    /// Indexed by `TypeId - 1`.
    infos: Vec<ComponentInfo>,
}

/// Assigns type identities on first use.
///
/// Cloning yields another handle to the same identity space, so a storage
/// manager and an inspector can share names. Separate registries are fully
/// independent.
///
/// # Example
///
/// ```rust,ignore
/// let registry = TypeRegistry::new();
/// let id = registry.type_id::<Position>();
/// assert_eq!(id, registry.type_id::<Position>());
/// assert_eq!(registry.name(id), "Position");
/// ```
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identity of `T`, assigning one on first call.
    pub fn type_id<T: 'static>(&self) -> TypeId {
        let key = std::any::TypeId::of::<T>();
        if let Some(id) = self.inner.read().ids.get(&key) {
            return *id;
        }

        let mut inner = self.inner.write();
        if let Some(id) = inner.ids.get(&key) {
            return *id;
        }

        inner.infos.push(ComponentInfo::of::<T>());
        let id = TypeId(inner.infos.len() as u64);
        inner.ids.insert(key, id);
        id
    }

    /// Returns the storage description of `id`.
    ///
    /// Relations share the description of their (zero-sized) kind.
    #[must_use]
    pub fn info(&self, id: TypeId) -> Option<ComponentInfo> {
        let index = usize::try_from(id.kind().0).ok()?.checked_sub(1)?;
        self.inner.read().infos.get(index).copied()
    }

    /// Formats `id` for humans: `Position`, or `ChildOf(#3)` for relations.
    #[must_use]
    pub fn name(&self, id: TypeId) -> String {
        let base = self
            .info(id)
            .map_or_else(|| format!("?{}", id.kind().0), |info| info.name().to_owned());

        match id.target() {
            Some(target) => format!("{base}({target})"),
            None => base,
        }
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().infos.len()
    }

    /// Checks if no type has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position;
    struct Mesh;

    #[test]
    fn test_type_id_is_idempotent() {
        let registry = TypeRegistry::new();
        let a = registry.type_id::<Position>();
        let b = registry.type_id::<Mesh>();

        assert_ne!(a, b);
        assert_eq!(a, registry.type_id::<Position>());
        assert_eq!(registry.len(), 2);
        assert!(!a.is_relation());
    }

    #[test]
    fn test_registries_are_independent() {
        let first = TypeRegistry::new();
        let second = TypeRegistry::new();
        first.type_id::<Position>();

        assert_eq!(second.type_id::<Mesh>(), first.type_id::<Position>());
        assert_eq!(second.name(second.type_id::<Mesh>()), "Mesh");
    }

    #[test]
    fn test_clones_share_identity_space() {
        let registry = TypeRegistry::new();
        let inspector = registry.clone();
        let id = registry.type_id::<Position>();

        assert_eq!(inspector.type_id::<Position>(), id);
        assert_eq!(inspector.name(id), "Position");
    }

    #[test]
    fn test_relation_ids() {
        let registry = TypeRegistry::new();
        let child_of = registry.type_id::<ChildOf>();
        let relation = TypeId::relation(child_of, Uuid::new(3));

        assert!(relation.is_relation());
        assert_eq!(relation.kind(), child_of);
        assert_eq!(relation.target(), Some(Uuid::new(3)));
        assert_eq!(registry.name(relation), "ChildOf(#3)");
        assert!(registry.info(relation).unwrap().is_zero_sized());
    }

    #[test]
    fn test_unknown_id_name() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.name(TypeId::from_raw(9)), "?9");
        assert!(registry.info(TypeId::from_raw(0)).is_none());
    }
}
