//! # Archetype Index
//!
//! Maps canonical type-sets to archetypes and each type to every archetype
//! containing it.

use std::collections::{BTreeMap, HashMap};
use std::ops::{Index, IndexMut};

use crate::error::{StorageError, StorageResult};

use super::archetype::{Archetype, ArchetypeId};
use super::registry::{ChildOf, TypeId, TypeRegistry};

/// Owns every archetype.
///
/// Archetypes are never destroyed, even when empty, so an [`ArchetypeId`]
/// stays valid for the index's lifetime.
#[derive(Debug, Default)]
pub struct ArchetypeIndex {
    /// Indexed by `ArchetypeId`.
    archetypes: Vec<Archetype>,
    /// Canonical shape -> archetype.
    by_shape: HashMap<Vec<TypeId>, ArchetypeId>,
    /// Type -> (archetype -> column of that type).
    component_index: HashMap<TypeId, BTreeMap<ArchetypeId, usize>>,
    /// Initial row capacity of new archetypes.
    archetype_capacity: usize,
}

impl ArchetypeIndex {
    /// Creates an empty index whose archetypes start with room for
    /// `archetype_capacity` rows.
    #[must_use]
    pub fn new(archetype_capacity: usize) -> Self {
        Self {
            archetype_capacity,
            ..Self::default()
        }
    }

    /// Number of archetypes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Checks if no archetype exists yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Returns the archetype with `id`.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.get() as usize)
    }

    /// Returns the archetype with `id` mutably.
    #[inline]
    pub fn get_mut(&mut self, id: ArchetypeId) -> Option<&mut Archetype> {
        self.archetypes.get_mut(id.get() as usize)
    }

    /// Returns two distinct archetypes mutably.
    ///
    /// `None` if the ids are equal or either is unknown.
    pub fn pair_mut(
        &mut self,
        a: ArchetypeId,
        b: ArchetypeId,
    ) -> Option<(&mut Archetype, &mut Archetype)> {
        let (ia, ib) = (a.get() as usize, b.get() as usize);
        if ia == ib || ia >= self.archetypes.len() || ib >= self.archetypes.len() {
            return None;
        }

        if ia < ib {
            let (low, high) = self.archetypes.split_at_mut(ib);
            Some((&mut low[ia], &mut high[0]))
        } else {
            let (low, high) = self.archetypes.split_at_mut(ia);
            Some((&mut high[0], &mut low[ib]))
        }
    }

    /// Iterates over all archetypes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    /// Iterates mutably over all archetypes in creation order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Archetype> {
        self.archetypes.iter_mut()
    }

    /// Looks up the archetype for a type-set without creating it.
    ///
    /// The set is canonicalized first, so any permutation matches.
    #[must_use]
    pub fn find(&self, types: &[TypeId]) -> Option<ArchetypeId> {
        let mut shape = types.to_vec();
        shape.sort_unstable();
        self.by_shape.get(&shape).copied()
    }

    /// Returns the archetype for a type-set, creating it on first use.
    ///
    /// The set is sorted before lookup, so every permutation of the same
    /// types yields the same archetype.
    ///
    /// # Errors
    ///
    /// - [`StorageError::DuplicateType`] if a type appears twice (also a
    ///   debug assertion: it means a caller built a bad shape)
    /// - [`StorageError::UnregisteredType`] if `registry` does not know a
    ///   type
    /// - [`StorageError::InvalidRelation`] if a relation id is not of kind
    ///   [`ChildOf`]
    pub fn get_or_create(
        &mut self,
        types: &[TypeId],
        registry: &TypeRegistry,
    ) -> StorageResult<ArchetypeId> {
        let mut shape = types.to_vec();
        shape.sort_unstable();

        if let Some(id) = self.by_shape.get(&shape) {
            return Ok(*id);
        }

        if let Some(pair) = shape.windows(2).find(|w| w[0] == w[1]) {
            debug_assert!(false, "duplicate type {} in archetype shape", pair[0]);
            return Err(StorageError::DuplicateType(pair[0]));
        }

        let infos = shape
            .iter()
            .map(|t| registry.info(*t).ok_or(StorageError::UnregisteredType(*t)))
            .collect::<StorageResult<Vec<_>>>()?;
        // Relation columns are committed without a value.
        if let Some((ty, _)) = shape
            .iter()
            .zip(&infos)
            .find(|(ty, info)| ty.is_relation() && !info.is::<ChildOf>())
        {
            return Err(StorageError::InvalidRelation(*ty));
        }

        let id = ArchetypeId::new(self.archetypes.len() as u32);
        for (column, ty) in shape.iter().enumerate() {
            self.component_index
                .entry(*ty)
                .or_default()
                .insert(id, column);
        }
        self.by_shape.insert(shape.clone(), id);

        tracing::debug!(
            "created archetype {} {{{}}}",
            id,
            shape
                .iter()
                .map(|t| registry.name(*t))
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.archetypes
            .push(Archetype::new(id, shape, &infos, self.archetype_capacity));

        Ok(id)
    }

    /// Every archetype containing `type_id`, with the column holding it,
    /// in ascending id order.
    pub fn with_type(&self, type_id: TypeId) -> impl Iterator<Item = (ArchetypeId, usize)> + '_ {
        self.component_index
            .get(&type_id)
            .into_iter()
            .flat_map(|map| map.iter().map(|(id, column)| (*id, *column)))
    }

    /// Mutable form of [`with_type`](Self::with_type), yielding the
    /// archetypes themselves.
    pub fn with_type_mut(
        &mut self,
        type_id: TypeId,
    ) -> impl Iterator<Item = (&mut Archetype, usize)> + '_ {
        let mut ids = self
            .component_index
            .get(&type_id)
            .into_iter()
            .flat_map(BTreeMap::iter);
        // Ids ascend, so each match is split off the front of what is left.
        let mut rest: &mut [Archetype] = &mut self.archetypes;
        let mut offset = 0;

        std::iter::from_fn(move || {
            let (id, column) = ids.next()?;
            let skip = (id.get() as usize).checked_sub(offset)?;
            let (archetype, tail) = std::mem::take(&mut rest).get_mut(skip..)?.split_first_mut()?;
            rest = tail;
            offset = id.get() as usize + 1;
            Some((archetype, *column))
        })
    }

    /// The column holding `type_id` in archetype `id`.
    #[must_use]
    pub fn column_of(&self, id: ArchetypeId, type_id: TypeId) -> Option<usize> {
        self.component_index.get(&type_id)?.get(&id).copied()
    }
}

impl Index<ArchetypeId> for ArchetypeIndex {
    type Output = Archetype;

    /// # Panics
    ///
    /// If `id` was not issued by this index.
    fn index(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.get() as usize]
    }
}

impl IndexMut<ArchetypeId> for ArchetypeIndex {
    fn index_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.get() as usize]
    }
}
