//! # Archetype-based Entity Storage
//!
//! Entities with the same component set are stored together: one row per
//! entity, one [`Column`] per type.
//!
//! ```text
//! Archetype {Player, Position, ChildOf(#1)}:
//!   entities:  [#2,   #7,   #9  ]
//!   Player:    [P2,   P7,   P9  ]   <- contiguous
//!   Position:  [X2,   X7,   X9  ]   <- contiguous
//!   ChildOf:   (zero-sized)
//! ```
//!
//! ## Row indices are not stable
//!
//! Rows are removed by swap-and-pop: the last row moves into the hole.
//! Every removal reports which uuid moved so the caller can refresh its
//! location record. References into a column are only valid until the
//! next mutation of the same archetype; re-derive them from
//! `(archetype, row)`.

// SAFETY: Rows are assembled from type-erased column writes. Every unsafe
// block states the invariant it relies on.
#![allow(unsafe_code)]

use std::fmt;

use crate::error::{StorageError, StorageResult};

use super::column::{Column, ComponentInfo};
use super::node::Uuid;
use super::registry::{ChildOf, TypeId};

/// Identity of an archetype. Assigned in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// Creates an archetype id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Result of moving a row between archetypes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Migration {
    /// Row of the entity in the destination archetype.
    pub row: usize,
    /// Entity that was swapped into the vacated source row, if any.
    pub moved: Option<Uuid>,
}

/// A columnar table of every entity sharing one exact type-set.
#[derive(Debug)]
pub struct Archetype {
    /// Id, fixed at construction.
    id: ArchetypeId,
    /// Sorted, duplicate-free shape.
    types: Vec<TypeId>,
    /// One column per entry of `types`, same order.
    columns: Vec<Column>,
    /// Owner of each row (for reverse lookup).
    entities: Vec<Uuid>,
}

impl Archetype {
    /// Creates an empty archetype.
    ///
    /// `types` must be sorted and duplicate-free; `infos` must describe
    /// each entry of `types` in the same order. Relation entries must be of
    /// kind [`ChildOf`]: their columns are committed without a value.
    pub(crate) fn new(
        id: ArchetypeId,
        types: Vec<TypeId>,
        infos: &[ComponentInfo],
        capacity: usize,
    ) -> Self {
        debug_assert!(types.windows(2).all(|w| w[0] < w[1]), "shape not canonical");
        debug_assert_eq!(types.len(), infos.len());
        debug_assert!(
            types
                .iter()
                .zip(infos)
                .all(|(ty, info)| !ty.is_relation() || info.is::<ChildOf>()),
            "relation column of a kind other than ChildOf"
        );

        let mut archetype = Self {
            id,
            types,
            columns: infos.iter().copied().map(Column::new).collect(),
            entities: Vec::new(),
        };
        archetype.reserve(capacity);
        archetype
    }

    /// Returns the id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Returns the sorted type vector.
    #[inline]
    #[must_use]
    pub fn types(&self) -> &[TypeId] {
        &self.types
    }

    /// Returns the number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Checks if the archetype holds no row.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Row owners, in row order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Uuid] {
        &self.entities
    }

    /// Gets the uuid owning `row`.
    #[inline]
    #[must_use]
    pub fn entity_at(&self, row: usize) -> Option<Uuid> {
        self.entities.get(row).copied()
    }

    /// Finds the column holding `type_id`.
    ///
    /// Linear scan: shapes are small.
    #[inline]
    #[must_use]
    pub fn column_index(&self, type_id: TypeId) -> Option<usize> {
        self.types.iter().position(|t| *t == type_id)
    }

    /// Checks if `type_id` is part of the shape.
    #[inline]
    #[must_use]
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.column_index(type_id).is_some()
    }

    /// Returns the column at `index`.
    ///
    /// Columns are only ever handed out shared; their length always
    /// equals [`len`](Self::len).
    ///
    /// ```compile_fail
    /// # fn shrink(archetype: &mut shadow_entity::Archetype) {
    /// let _ = archetype.column_mut(0);
    /// # }
    /// ```
    #[inline]
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Gets the `T` stored for `type_id` at `row`.
    #[inline]
    #[must_use]
    pub fn get<T: 'static>(&self, type_id: TypeId, row: usize) -> Option<&T> {
        self.columns[self.column_index(type_id)?].get(row)
    }

    /// Gets the `T` stored for `type_id` at `row` mutably.
    #[inline]
    pub fn get_mut<T: 'static>(&mut self, type_id: TypeId, row: usize) -> Option<&mut T> {
        let index = self.column_index(type_id)?;
        self.columns[index].get_mut(row)
    }

    /// Row owners alongside the `T` column for `type_id`.
    #[must_use]
    pub fn slice<T: 'static>(&self, type_id: TypeId) -> Option<(&[Uuid], &[T])> {
        let values = self.columns[self.column_index(type_id)?].as_slice()?;
        Some((&self.entities, values))
    }

    /// Row owners alongside the mutable `T` column for `type_id`.
    pub fn slice_mut<T: 'static>(&mut self, type_id: TypeId) -> Option<(&[Uuid], &mut [T])> {
        let index = self.column_index(type_id)?;
        let values = self.columns[index].as_mut_slice()?;
        Some((&self.entities, values))
    }

    /// Ensures room for `additional` rows in every column.
    pub fn reserve(&mut self, additional: usize) {
        self.entities.reserve(additional);
        for column in &mut self.columns {
            column.reserve(additional);
        }
    }

    /// Starts a new row owned by `uuid`.
    ///
    /// Relation columns need no value. Every other column, zero-sized ones
    /// included, must be set before [`RowWriter::finish`]; dropping an
    /// unfinished writer discards the row and drops whatever was already
    /// written.
    pub fn add_row(&mut self, uuid: Uuid) -> RowWriter<'_> {
        self.reserve(1);
        let written = self.types.iter().map(|t| t.is_relation()).collect();
        RowWriter {
            archetype: self,
            uuid,
            written,
            finished: false,
        }
    }

    /// Removes `row`, dropping its values.
    ///
    /// Returns the uuid that was swapped into `row`, if any; its location
    /// record must be updated by the caller.
    pub fn remove_row(&mut self, row: usize) -> Option<Uuid> {
        if row >= self.len() {
            return None;
        }

        for column in &mut self.columns {
            // SAFETY: row < len, and every column has exactly len values.
            unsafe { column.swap_remove(row, true) };
        }
        self.swap_remove_entity(row)
    }

    fn swap_remove_entity(&mut self, row: usize) -> Option<Uuid> {
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    /// Moves `row` into `dst`, whose shape is this shape plus `added`,
    /// writing `value` as the new column.
    ///
    /// # Errors
    ///
    /// [`StorageError::ColumnNotFound`] if `dst` has no column for `added`
    /// or `T` is not its type. Nothing is modified on error.
    pub(crate) fn migrate_with<T: 'static>(
        &mut self,
        row: usize,
        dst: &mut Archetype,
        added: TypeId,
        value: T,
    ) -> StorageResult<Migration> {
        let column = dst
            .column_index(added)
            .filter(|&i| dst.columns[i].info().is::<T>())
            .ok_or(StorageError::ColumnNotFound(added))?;
        self.check_migration(row, dst, Some(added))?;

        // SAFETY: check_migration verified the row and that every
        // non-relation column of dst is either shared with self or is `added`.
        Ok(unsafe {
            self.move_row_into(row, dst, None, |dst| {
                dst.columns[column].write_pending(value);
            })
        })
    }

    /// Moves `row` into `dst`, whose shape is this shape minus `removed`,
    /// and returns the removed value.
    ///
    /// # Errors
    ///
    /// [`StorageError::ColumnNotFound`] if this archetype has no column for
    /// `removed` or `T` is not its type. Nothing is modified on error.
    pub(crate) fn migrate_without<T: 'static>(
        &mut self,
        row: usize,
        dst: &mut Archetype,
        removed: TypeId,
    ) -> StorageResult<(Migration, T)> {
        let column = self
            .column_index(removed)
            .filter(|&i| self.columns[i].info().is::<T>())
            .ok_or(StorageError::ColumnNotFound(removed))?;
        self.check_migration(row, dst, None)?;

        // SAFETY: the column holds T and row < len; the slot is forgotten
        // by move_row_into because it is passed as `taken`.
        unsafe {
            let value = self.columns[column].read::<T>(row);
            let migration = self.move_row_into(row, dst, Some(column), |_| {});
            Ok((migration, value))
        }
    }

    /// Moves `row` into `dst`, whose shape is this shape minus `removed`,
    /// dropping the removed value in place.
    ///
    /// # Errors
    ///
    /// [`StorageError::ColumnNotFound`] if this archetype has no column for
    /// `removed`. Nothing is modified on error.
    pub(crate) fn migrate_dropping(
        &mut self,
        row: usize,
        dst: &mut Archetype,
        removed: TypeId,
    ) -> StorageResult<Migration> {
        if !self.contains(removed) {
            return Err(StorageError::ColumnNotFound(removed));
        }
        self.check_migration(row, dst, None)?;

        // SAFETY: check_migration verified the row and that dst needs no
        // value this archetype does not hold.
        Ok(unsafe { self.move_row_into(row, dst, None, |_| {}) })
    }

    /// Verifies that every non-relation column of `dst` will be initialized.
    fn check_migration(
        &self,
        row: usize,
        dst: &Archetype,
        added: Option<TypeId>,
    ) -> StorageResult<()> {
        if row >= self.len() {
            return Err(StorageError::RowOutOfBounds {
                row,
                len: self.len(),
            });
        }
        if let Some(added) = added.filter(|t| self.contains(*t)) {
            return Err(StorageError::DuplicateType(added));
        }

        for ty in &dst.types {
            let covered = ty.is_relation() || Some(*ty) == added || self.contains(*ty);
            if !covered {
                return Err(StorageError::IncompleteRow(*ty));
            }
        }
        Ok(())
    }

    /// Moves a row. Capacity is reserved before anything is touched, so
    /// once values start moving the operation cannot fail.
    ///
    /// Source columns absent from `dst` are dropped, except `taken`, whose
    /// value the caller has already read out.
    ///
    /// # Safety
    ///
    /// `row < self.len()`, and `fill` must write the pending slot of every
    /// non-relation column of `dst` that this archetype does not share.
    unsafe fn move_row_into(
        &mut self,
        row: usize,
        dst: &mut Archetype,
        taken: Option<usize>,
        fill: impl FnOnce(&mut Archetype),
    ) -> Migration {
        dst.reserve(1);
        let uuid = self.entities[row];

        for (ty, column) in dst.types.iter().zip(dst.columns.iter_mut()) {
            if let Some(source) = self.column_index(*ty) {
                column.move_pending_from(&self.columns[source], row);
            }
        }
        fill(dst);
        for column in &mut dst.columns {
            column.commit_pending();
        }
        dst.entities.push(uuid);

        for (index, (ty, column)) in self.types.iter().zip(self.columns.iter_mut()).enumerate() {
            let moved_out = taken == Some(index) || dst.contains(*ty);
            column.swap_remove(row, !moved_out);
        }
        let moved = self.swap_remove_entity(row);

        Migration {
            row: dst.len() - 1,
            moved,
        }
    }
}

/// A row under construction. See [`Archetype::add_row`].
pub struct RowWriter<'a> {
    archetype: &'a mut Archetype,
    uuid: Uuid,
    written: Vec<bool>,
    finished: bool,
}

impl RowWriter<'_> {
    /// Writes the value for `type_id`, replacing any earlier write.
    ///
    /// # Errors
    ///
    /// [`StorageError::ColumnNotFound`] if the shape has no `type_id`
    /// column or `T` is not its type.
    pub fn set<T: 'static>(&mut self, type_id: TypeId, value: T) -> StorageResult<()> {
        let index = self
            .archetype
            .column_index(type_id)
            .filter(|&i| self.archetype.columns[i].info().is::<T>())
            .ok_or(StorageError::ColumnNotFound(type_id))?;
        let column = &mut self.archetype.columns[index];

        // SAFETY: capacity was reserved by add_row and T is the column type.
        unsafe {
            if self.written[index] {
                column.drop_pending();
            }
            column.write_pending(value);
        }
        self.written[index] = true;
        Ok(())
    }

    /// Commits the row and returns its index.
    ///
    /// # Errors
    ///
    /// [`StorageError::IncompleteRow`] naming the first unwritten column.
    /// The row is discarded in that case.
    pub fn finish(mut self) -> StorageResult<usize> {
        if let Some(missing) = self.written.iter().position(|w| !w) {
            return Err(StorageError::IncompleteRow(self.archetype.types[missing]));
        }

        // SAFETY: every pending slot was written (checked above).
        unsafe {
            for column in &mut self.archetype.columns {
                column.commit_pending();
            }
        }
        self.archetype.entities.push(self.uuid);
        self.finished = true;
        Ok(self.archetype.len() - 1)
    }
}

impl Drop for RowWriter<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        for (column, written) in self.archetype.columns.iter_mut().zip(&self.written) {
            if *written {
                // SAFETY: the pending slot was written, or belongs to a
                // relation column whose kind has no drop glue.
                unsafe { column.drop_pending() };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::registry::TypeRegistry;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct A(u32);
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct B(f32);
    #[derive(Debug, Clone, PartialEq)]
    struct C(String);
    struct Tag;

    fn archetype(registry: &TypeRegistry, id: u32, mut types: Vec<TypeId>) -> Archetype {
        types.sort();
        let infos: Vec<_> = types.iter().map(|t| registry.info(*t).unwrap()).collect();
        Archetype::new(ArchetypeId::new(id), types, &infos, 0)
    }

    #[test]
    fn test_add_and_get() {
        let registry = TypeRegistry::new();
        let (a, b) = (registry.type_id::<A>(), registry.type_id::<B>());
        let mut table = archetype(&registry, 0, vec![a, b]);

        let mut row = table.add_row(Uuid::new(1));
        row.set(a, A(7)).unwrap();
        row.set(b, B(0.5)).unwrap();
        assert_eq!(row.finish().unwrap(), 0);

        assert_eq!(table.len(), 1);
        assert_eq!(table.get::<A>(a, 0), Some(&A(7)));
        assert_eq!(table.get::<B>(b, 0), Some(&B(0.5)));
        assert_eq!(table.get::<B>(a, 0), None);
        assert_eq!(table.entity_at(0), Some(Uuid::new(1)));
    }

    #[test]
    fn test_unfinished_row_is_discarded() {
        let registry = TypeRegistry::new();
        let (a, c) = (registry.type_id::<A>(), registry.type_id::<C>());
        let mut table = archetype(&registry, 0, vec![a, c]);

        let mut row = table.add_row(Uuid::new(1));
        row.set(c, C("leak?".into())).unwrap();
        assert_eq!(row.finish(), Err(StorageError::IncompleteRow(a)));
        assert!(table.is_empty());
        assert_eq!(table.column(0).unwrap().len(), 0);
    }

    #[test]
    fn test_relation_columns_need_no_value() {
        let registry = TypeRegistry::new();
        let a = registry.type_id::<A>();
        let parent = TypeId::relation(registry.type_id::<ChildOf>(), Uuid::new(1));
        let mut table = archetype(&registry, 0, vec![a, parent]);

        let mut row = table.add_row(Uuid::new(2));
        row.set(a, A(1)).unwrap();
        assert_eq!(row.finish(), Ok(0));
        assert_eq!(table.column(1).unwrap().len(), 1);
    }

    #[test]
    fn test_unset_zero_sized_column_is_incomplete() {
        enum Never {}
        let registry = TypeRegistry::new();
        let (a, tag, never) = (
            registry.type_id::<A>(),
            registry.type_id::<Tag>(),
            registry.type_id::<Never>(),
        );

        let mut table = archetype(&registry, 0, vec![a, tag]);
        let mut row = table.add_row(Uuid::new(1));
        row.set(a, A(1)).unwrap();
        assert_eq!(row.finish(), Err(StorageError::IncompleteRow(tag)));
        assert!(table.is_empty());

        let mut table = archetype(&registry, 1, vec![never]);
        assert_eq!(
            table.add_row(Uuid::new(1)).finish(),
            Err(StorageError::IncompleteRow(never))
        );
        assert!(table.get::<Never>(never, 0).is_none());
    }

    #[test]
    fn test_zero_sized_values_drop_only_when_written() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DROPS: AtomicUsize = AtomicUsize::new(0);
        struct Marker;
        impl Drop for Marker {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let registry = TypeRegistry::new();
        let (a, marker) = (registry.type_id::<A>(), registry.type_id::<Marker>());
        let mut table = archetype(&registry, 0, vec![a, marker]);

        let mut row = table.add_row(Uuid::new(1));
        row.set(a, A(1)).unwrap();
        assert!(row.finish().is_err());
        assert_eq!(DROPS.load(Ordering::SeqCst), 0);

        let mut row = table.add_row(Uuid::new(1));
        row.set(a, A(1)).unwrap();
        row.set(marker, Marker).unwrap();
        row.set(marker, Marker).unwrap();
        row.finish().unwrap();
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);

        table.remove_row(0);
        assert_eq!(DROPS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_migrate_requires_zero_sized_values() {
        let registry = TypeRegistry::new();
        let (a, b, tag) = (
            registry.type_id::<A>(),
            registry.type_id::<B>(),
            registry.type_id::<Tag>(),
        );
        let parent = TypeId::relation(registry.type_id::<ChildOf>(), Uuid::new(9));
        let mut src = archetype(&registry, 0, vec![a]);
        let mut with_tag = archetype(&registry, 1, vec![a, b, tag]);
        let mut with_parent = archetype(&registry, 2, vec![a, b, parent]);

        let mut row = src.add_row(Uuid::new(1));
        row.set(a, A(5)).unwrap();
        row.finish().unwrap();

        assert_eq!(
            src.migrate_with(0, &mut with_tag, b, B(1.0)),
            Err(StorageError::IncompleteRow(tag))
        );
        assert!(with_tag.is_empty());

        src.migrate_with(0, &mut with_parent, b, B(1.0)).unwrap();
        assert_eq!(with_parent.get::<A>(a, 0), Some(&A(5)));
        assert!(src.is_empty());
    }

    #[test]
    fn test_columns_track_row_count() {
        let registry = TypeRegistry::new();
        let (a, c) = (registry.type_id::<A>(), registry.type_id::<C>());
        let mut src = archetype(&registry, 0, vec![a, c]);
        let mut dst = archetype(&registry, 1, vec![a]);
        let in_sync = |table: &Archetype| {
            (0..table.types().len()).all(|i| table.column(i).unwrap().len() == table.len())
        };

        for i in 1..=4 {
            let mut row = src.add_row(Uuid::new(i));
            row.set(a, A(i)).unwrap();
            row.set(c, C(i.to_string())).unwrap();
            row.finish().unwrap();
        }
        src.remove_row(1);
        src.migrate_dropping(0, &mut dst, c).unwrap();
        src.migrate_without::<C>(0, &mut dst, c).unwrap();
        src.add_row(Uuid::new(5));

        assert_eq!((src.len(), dst.len()), (1, 2));
        assert!(in_sync(&src));
        assert!(in_sync(&dst));
    }

    #[test]
    fn test_remove_row_reports_moved_entity() {
        let registry = TypeRegistry::new();
        let a = registry.type_id::<A>();
        let mut table = archetype(&registry, 0, vec![a]);

        for i in 1..=3 {
            let mut row = table.add_row(Uuid::new(i));
            row.set(a, A(i * 10)).unwrap();
            row.finish().unwrap();
        }

        assert_eq!(table.remove_row(0), Some(Uuid::new(3)));
        assert_eq!(table.get::<A>(a, 0), Some(&A(30)));
        assert_eq!(table.remove_row(1), None);
        assert_eq!(table.remove_row(5), None);
        assert_eq!(table.entities(), &[Uuid::new(3)]);
    }

    #[test]
    fn test_migrate_with_preserves_values() {
        let registry = TypeRegistry::new();
        let (a, b, c) = (
            registry.type_id::<A>(),
            registry.type_id::<B>(),
            registry.type_id::<C>(),
        );
        let mut src = archetype(&registry, 0, vec![a, b]);
        let mut dst = archetype(&registry, 1, vec![a, b, c]);

        for i in 1..=2 {
            let mut row = src.add_row(Uuid::new(i));
            row.set(a, A(i)).unwrap();
            row.set(b, B(i as f32)).unwrap();
            row.finish().unwrap();
        }

        let migration = src.migrate_with(0, &mut dst, c, C("new".into())).unwrap();
        assert_eq!(migration, Migration { row: 0, moved: Some(Uuid::new(2)) });

        assert_eq!(dst.get::<A>(a, 0), Some(&A(1)));
        assert_eq!(dst.get::<B>(b, 0), Some(&B(1.0)));
        assert_eq!(dst.get::<C>(c, 0), Some(&C("new".into())));
        assert_eq!(src.len(), 1);
        assert_eq!(src.get::<A>(a, 0), Some(&A(2)));
    }

    #[test]
    fn test_migrate_without_returns_value() {
        let registry = TypeRegistry::new();
        let (a, c) = (registry.type_id::<A>(), registry.type_id::<C>());
        let mut src = archetype(&registry, 0, vec![a, c]);
        let mut dst = archetype(&registry, 1, vec![a]);

        let mut row = src.add_row(Uuid::new(1));
        row.set(a, A(5)).unwrap();
        row.set(c, C("gone".into())).unwrap();
        row.finish().unwrap();

        let (migration, value) = src.migrate_without::<C>(0, &mut dst, c).unwrap();
        assert_eq!(value, C("gone".into()));
        assert_eq!(migration.moved, None);
        assert!(src.is_empty());
        assert_eq!(dst.get::<A>(a, 0), Some(&A(5)));
    }

    #[test]
    fn test_migrate_dropping_drops_removed_value() {
        let registry = TypeRegistry::new();
        let (a, c) = (registry.type_id::<A>(), registry.type_id::<C>());
        let mut src = archetype(&registry, 0, vec![a, c]);
        let mut dst = archetype(&registry, 1, vec![a]);

        for i in 1..=2 {
            let mut row = src.add_row(Uuid::new(i));
            row.set(a, A(i)).unwrap();
            row.set(c, C(format!("c{i}"))).unwrap();
            row.finish().unwrap();
        }

        let migration = src.migrate_dropping(0, &mut dst, c).unwrap();
        assert_eq!(migration.moved, Some(Uuid::new(2)));
        assert_eq!(dst.get::<A>(a, 0), Some(&A(1)));
        assert_eq!(src.get::<C>(c, 0), Some(&C("c2".into())));
        assert_eq!(
            src.migrate_dropping(0, &mut dst, registry.type_id::<B>()),
            Err(StorageError::ColumnNotFound(registry.type_id::<B>()))
        );
    }

    #[test]
    fn test_slices_pair_entities_with_values() {
        let registry = TypeRegistry::new();
        let a = registry.type_id::<A>();
        let mut table = archetype(&registry, 0, vec![a]);
        for i in 1..=3 {
            let mut row = table.add_row(Uuid::new(i));
            row.set(a, A(i)).unwrap();
            row.finish().unwrap();
        }

        for value in table.slice_mut::<A>(a).unwrap().1 {
            value.0 *= 2;
        }
        let (entities, values) = table.slice::<A>(a).unwrap();
        assert_eq!(entities, &[Uuid::new(1), Uuid::new(2), Uuid::new(3)]);
        assert_eq!(values, &[A(2), A(4), A(6)]);
        assert!(table.slice::<B>(a).is_none());
    }

    #[test]
    fn test_migrate_rejects_incomplete_destination() {
        let registry = TypeRegistry::new();
        let (a, b, c) = (
            registry.type_id::<A>(),
            registry.type_id::<B>(),
            registry.type_id::<C>(),
        );
        let mut src = archetype(&registry, 0, vec![a]);
        let mut dst = archetype(&registry, 1, vec![a, b, c]);

        let mut row = src.add_row(Uuid::new(1));
        row.set(a, A(5)).unwrap();
        row.finish().unwrap();

        let result = src.migrate_with(0, &mut dst, c, C("x".into()));
        assert_eq!(result, Err(StorageError::IncompleteRow(b)));
        assert_eq!(src.len(), 1);
        assert!(dst.is_empty());
    }
}
