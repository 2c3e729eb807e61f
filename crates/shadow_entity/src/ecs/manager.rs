//! # Storage Manager
//!
//! Ties the pieces together: a pool slot per node (identity and
//! generation), an archetype row per row-owning node (data), and a
//! uuid -> [`Record`] table kept in sync with every row move.
//!
//! ## Node placement
//!
//! | created with      | pool slot | archetype row                      |
//! |-------------------|-----------|------------------------------------|
//! | `add`             | yes       | own row, shape `{T}`               |
//! | `add_child`       | yes       | own row, shape `{T, ChildOf(p)}`   |
//! | `add_component`   | yes       | a column in the host entity's row  |

use std::collections::HashMap;

use crate::config::StorageConfig;
use crate::error::{HandleError, StorageError, StorageResult};
use crate::memory::{PoolAllocator, SlotAddress};

use super::archetype::{ArchetypeId, Migration};
use super::dump::{ArchetypeSummary, PoolSummary, StorageDump};
use super::handle::Handle;
use super::index::ArchetypeIndex;
use super::node::{Node, NodeKind, NodeRecord, Uuid};
use super::registry::{ChildOf, TypeId, TypeRegistry};

/// Location of a row-owning node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record {
    /// Archetype holding the row.
    pub archetype: ArchetypeId,
    /// Row index inside the archetype.
    pub row: usize,
}

/// Entity/component storage.
///
/// Single-threaded: every mutation takes `&mut self`.
///
/// # Example
///
/// ```rust,ignore
/// let mut storage = StorageManager::new();
/// let scene = storage.add(Scene::default())?;
/// let scene_id = storage.uuid_of(scene)?;
/// let player = storage.add_child(scene_id, Player::new("hero"))?;
///
/// for (uuid, position) in storage.query::<Position>() {
///     println!("{uuid}: {position:?}");
/// }
/// ```
#[derive(Debug)]
pub struct StorageManager {
    registry: TypeRegistry,
    config: StorageConfig,
    /// One pool of identity slots per node type.
    pools: HashMap<TypeId, PoolAllocator<NodeRecord>>,
    index: ArchetypeIndex,
    /// Row location of every node that owns a row.
    records: HashMap<Uuid, Record>,
    /// Pool slot of every live node.
    slots: HashMap<Uuid, (TypeId, SlotAddress)>,
    /// `(host, component type)` -> uuid of the attached component.
    attached: HashMap<(Uuid, TypeId), Uuid>,
    next_uuid: u32,
    child_of: TypeId,
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageManager {
    /// Creates an empty manager with its own registry and default sizing.
    #[must_use]
    pub fn new() -> Self {
        Self::build(TypeRegistry::new(), StorageConfig::default())
    }

    /// Creates an empty manager with custom sizing.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidConfig`] if `config` fails validation.
    pub fn with_config(config: StorageConfig) -> StorageResult<Self> {
        Self::with_registry(TypeRegistry::new(), config)
    }

    /// Creates an empty manager sharing an existing registry.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidConfig`] if `config` fails validation.
    pub fn with_registry(registry: TypeRegistry, config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        Ok(Self::build(registry, config))
    }

    fn build(registry: TypeRegistry, config: StorageConfig) -> Self {
        let child_of = registry.type_id::<ChildOf>();
        Self {
            index: ArchetypeIndex::new(config.archetype_capacity),
            registry,
            config,
            pools: HashMap::new(),
            records: HashMap::new(),
            slots: HashMap::new(),
            attached: HashMap::new(),
            next_uuid: 1,
            child_of,
        }
    }

    /// The registry naming this manager's types.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The sizing this manager was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// All archetypes.
    #[inline]
    #[must_use]
    pub fn archetypes(&self) -> &ArchetypeIndex {
        &self.index
    }

    /// Number of live nodes (entities and components).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Checks if no node is alive.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Checks if `uuid` names a live node.
    #[inline]
    #[must_use]
    pub fn contains(&self, uuid: Uuid) -> bool {
        self.slots.contains_key(&uuid)
    }

    /// Row location of `uuid`. `None` for unknown uuids and for components
    /// attached with [`add_component`](Self::add_component).
    #[inline]
    #[must_use]
    pub fn location(&self, uuid: Uuid) -> Option<Record> {
        self.records.get(&uuid).copied()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Stores a root entity in its own `{T}` row.
    ///
    /// # Errors
    ///
    /// - [`StorageError::KindMismatch`] if `T` is not an entity type
    /// - [`StorageError::Allocator`] if `T`'s pool cannot grow
    /// - [`StorageError::UuidExhausted`] if every uuid has been issued
    /// - whatever [`Node::on_added`] returns
    pub fn add<T: Node>(&mut self, value: T) -> StorageResult<Handle<T>> {
        expect_kind::<T>(NodeKind::Entity)?;
        self.spawn(value, None)
    }

    /// Stores a node in its own `{T, ChildOf(parent)}` row.
    ///
    /// Accepts entity and component types alike.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if `parent` is not alive
    /// - [`StorageError::Allocator`] if `T`'s pool cannot grow
    /// - [`StorageError::UuidExhausted`] if every uuid has been issued
    /// - whatever [`Node::on_added`] returns
    pub fn add_child<T: Node>(&mut self, parent: Uuid, value: T) -> StorageResult<Handle<T>> {
        if !self.contains(parent) {
            return Err(StorageError::NotFound(parent));
        }
        self.spawn(value, Some(parent))
    }

    /// Attaches a component to `entity`, migrating the entity's row to the
    /// shape that includes `T`. Every value already in the row is kept.
    ///
    /// # Errors
    ///
    /// - [`StorageError::KindMismatch`] if `T` is not a component type or
    ///   `entity` is not an entity
    /// - [`StorageError::NotFound`] if `entity` is not alive
    /// - [`StorageError::DuplicateComponent`] if the entity already has a `T`
    /// - [`StorageError::Allocator`] if `T`'s pool cannot grow
    /// - [`StorageError::UuidExhausted`] if every uuid has been issued
    /// - whatever [`Node::on_added`] returns
    ///
    /// The entity is untouched on every error except the last.
    pub fn add_component<T: Node>(&mut self, entity: Uuid, value: T) -> StorageResult<Handle<T>> {
        expect_kind::<T>(NodeKind::Component)?;
        let record = self.host_record(entity)?;
        let ty = self.registry.type_id::<T>();

        if self.index[record.archetype].contains(ty) {
            return Err(StorageError::DuplicateComponent {
                entity,
                type_name: self.registry.name(ty),
            });
        }

        let mut shape = self.index[record.archetype].types().to_vec();
        shape.push(ty);
        let dst = self.index.get_or_create(&shape, &self.registry)?;

        let uuid = self.next_uuid()?;
        let node = NodeRecord {
            uuid,
            kind: T::KIND,
            host: entity,
        };
        let (address, generation) =
            pool_for(&mut self.pools, ty, self.config.chunk_capacity).allocate(node)?;

        let moved = self
            .index
            .pair_mut(record.archetype, dst)
            .ok_or(StorageError::DuplicateType(ty))
            .and_then(|(src, dst)| src.migrate_with(record.row, dst, ty, value));
        let migration = match moved {
            Ok(migration) => migration,
            Err(e) => {
                let _ = pool_for(&mut self.pools, ty, self.config.chunk_capacity)
                    .deallocate(address);
                return Err(e);
            }
        };

        self.commit_migration(entity, record, dst, migration);
        self.slots.insert(uuid, (ty, address));
        self.attached.insert((entity, ty), uuid);

        T::on_added(self, uuid)?;
        Ok(Handle::new(ty, address, generation))
    }

    fn spawn<T: Node>(&mut self, value: T, parent: Option<Uuid>) -> StorageResult<Handle<T>> {
        let ty = self.registry.type_id::<T>();
        let mut shape = vec![ty];
        if let Some(parent) = parent {
            shape.push(TypeId::relation(self.child_of, parent));
        }
        let archetype = self.index.get_or_create(&shape, &self.registry)?;

        let uuid = self.next_uuid()?;
        let node = NodeRecord {
            uuid,
            kind: T::KIND,
            host: uuid,
        };
        let (address, generation) =
            pool_for(&mut self.pools, ty, self.config.chunk_capacity).allocate(node)?;

        let mut row = self.index[archetype].add_row(uuid);
        let written = row.set(ty, value).and_then(|()| row.finish());
        let row = match written {
            Ok(row) => row,
            Err(e) => {
                let _ = pool_for(&mut self.pools, ty, self.config.chunk_capacity)
                    .deallocate(address);
                return Err(e);
            }
        };

        self.records.insert(uuid, Record { archetype, row });
        self.slots.insert(uuid, (ty, address));

        T::on_added(self, uuid)?;
        Ok(Handle::new(ty, address, generation))
    }

    /// Issues the next uuid. Zero is never issued, so the counter stops
    /// one short of `u32::MAX`.
    fn next_uuid(&mut self) -> StorageResult<Uuid> {
        let uuid = Uuid::new(self.next_uuid);
        self.next_uuid = self
            .next_uuid
            .checked_add(1)
            .ok_or(StorageError::UuidExhausted)?;
        Ok(uuid)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Detaches the `T` component from `entity` and returns its value.
    ///
    /// The component's uuid dies with it; so do its children.
    ///
    /// # Errors
    ///
    /// - [`StorageError::KindMismatch`] if `T` is not a component type or
    ///   `entity` is not an entity
    /// - [`StorageError::NotFound`] if `entity` is not alive
    /// - [`StorageError::MissingComponent`] if the entity has no `T`
    pub fn remove_component<T: Node>(&mut self, entity: Uuid) -> StorageResult<T> {
        expect_kind::<T>(NodeKind::Component)?;
        let record = self.host_record(entity)?;
        let ty = self.registry.type_id::<T>();

        let mut shape = self.index[record.archetype].types().to_vec();
        let Some(position) = shape.iter().position(|t| *t == ty) else {
            return Err(StorageError::MissingComponent {
                entity,
                type_name: self.registry.name(ty),
            });
        };
        shape.remove(position);
        let dst = self.index.get_or_create(&shape, &self.registry)?;

        let (migration, value) = self
            .index
            .pair_mut(record.archetype, dst)
            .ok_or(StorageError::DuplicateType(ty))
            .and_then(|(src, dst)| src.migrate_without::<T>(record.row, dst, ty))?;
        self.commit_migration(entity, record, dst, migration);

        if let Some(component) = self.attached.remove(&(entity, ty)) {
            self.destroy_children(component)?;
            self.free_slot(component)?;
        }
        Ok(value)
    }

    /// Destroys a node, every component attached to it, and recursively
    /// every child. Returns the number of nodes destroyed.
    ///
    /// Destroying an attached component detaches it from its host.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] if `uuid` is not alive.
    pub fn destroy(&mut self, uuid: Uuid) -> StorageResult<usize> {
        if !self.contains(uuid) {
            return Err(StorageError::NotFound(uuid));
        }

        let destroyed = self.destroy_node(uuid)?;
        tracing::debug!("destroyed {} ({} nodes)", uuid, destroyed);
        Ok(destroyed)
    }

    fn destroy_node(&mut self, uuid: Uuid) -> StorageResult<usize> {
        let mut destroyed = self.destroy_children(uuid)?;

        if let Some(record) = self.records.remove(&uuid) {
            let archetype = &mut self.index[record.archetype];
            let types = archetype.types().to_vec();
            if let Some(moved) = archetype.remove_row(record.row) {
                if let Some(moved) = self.records.get_mut(&moved) {
                    moved.row = record.row;
                }
            }

            for ty in types {
                if let Some(component) = self.attached.remove(&(uuid, ty)) {
                    destroyed += self.destroy_children(component)?;
                    self.free_slot(component)?;
                    destroyed += 1;
                }
            }
        } else {
            self.detach(uuid)?;
        }

        self.free_slot(uuid)?;
        Ok(destroyed + 1)
    }

    fn destroy_children(&mut self, parent: Uuid) -> StorageResult<usize> {
        let children: Vec<Uuid> = self.children_of(parent).collect();
        let mut destroyed = 0;
        for child in children {
            destroyed += self.destroy_node(child)?;
        }
        Ok(destroyed)
    }

    /// Drops an attached component's value out of its host's row.
    fn detach(&mut self, component: Uuid) -> StorageResult<()> {
        let (ty, address) = self.slot(component)?;
        let host = self
            .pools
            .get(&ty)
            .and_then(|pool| pool.get(address, pool.generation(address)?))
            .map(|node| node.host)
            .ok_or(StorageError::NotFound(component))?;
        let record = self.records.get(&host).copied().ok_or(StorageError::NotFound(host))?;

        let mut shape = self.index[record.archetype].types().to_vec();
        shape.retain(|t| *t != ty);
        let dst = self.index.get_or_create(&shape, &self.registry)?;

        let migration = self
            .index
            .pair_mut(record.archetype, dst)
            .ok_or(StorageError::ColumnNotFound(ty))
            .and_then(|(src, dst)| src.migrate_dropping(record.row, dst, ty))?;
        self.commit_migration(host, record, dst, migration);
        self.attached.remove(&(host, ty));
        Ok(())
    }

    fn free_slot(&mut self, uuid: Uuid) -> StorageResult<()> {
        let (ty, address) = self.slots.remove(&uuid).ok_or(StorageError::NotFound(uuid))?;
        let pool = self.pools.get_mut(&ty).ok_or(StorageError::UnregisteredType(ty))?;
        pool.deallocate(address)?;
        Ok(())
    }

    /// Points `uuid` at its new row and refreshes the entity that was
    /// swapped into its old one.
    fn commit_migration(&mut self, uuid: Uuid, from: Record, to: ArchetypeId, migration: Migration) {
        self.records.insert(
            uuid,
            Record {
                archetype: to,
                row: migration.row,
            },
        );
        if let Some(moved) = migration.moved {
            if let Some(moved) = self.records.get_mut(&moved) {
                moved.row = from.row;
            }
        }
        tracing::trace!("migrated {} {} -> {}", uuid, from.archetype, to);
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Gets the `T` stored in `entity`'s row.
    ///
    /// `None` if the entity is unknown or its archetype has no `T`.
    #[must_use]
    pub fn get_component<T: 'static>(&self, entity: Uuid) -> Option<&T> {
        let record = self.records.get(&entity)?;
        let ty = self.registry.type_id::<T>();
        self.index[record.archetype].get(ty, record.row)
    }

    /// Gets the `T` stored in `entity`'s row mutably.
    pub fn get_component_mut<T: 'static>(&mut self, entity: Uuid) -> Option<&mut T> {
        let record = *self.records.get(&entity)?;
        let ty = self.registry.type_id::<T>();
        self.index[record.archetype].get_mut(ty, record.row)
    }

    /// Resolves a handle.
    ///
    /// # Errors
    ///
    /// - [`HandleError::Null`] for a null handle
    /// - [`HandleError::TypeMismatch`] if the handle was not made for `T`
    ///   by this manager's registry
    /// - [`HandleError::Stale`] if the node was destroyed or its slot reused
    pub fn get<T: 'static>(&self, handle: Handle<T>) -> StorageResult<&T> {
        let (ty, record) = self.resolve(handle)?;
        self.index[record.archetype]
            .get(ty, record.row)
            .ok_or(StorageError::Handle(HandleError::TypeMismatch))
    }

    /// Resolves a handle mutably. Fails like [`get`](Self::get).
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn get_mut<T: 'static>(&mut self, handle: Handle<T>) -> StorageResult<&mut T> {
        let (ty, record) = self.resolve(handle)?;
        self.index[record.archetype]
            .get_mut(ty, record.row)
            .ok_or(StorageError::Handle(HandleError::TypeMismatch))
    }

    /// Checks if `handle` still resolves.
    #[must_use]
    pub fn is_valid<T: 'static>(&self, handle: Handle<T>) -> bool {
        self.node(handle).is_ok()
    }

    /// Uuid of the node behind `handle`.
    ///
    /// # Errors
    ///
    /// Fails like [`get`](Self::get).
    pub fn uuid_of<T: 'static>(&self, handle: Handle<T>) -> StorageResult<Uuid> {
        Ok(self.node(handle)?.uuid)
    }

    /// Makes a fresh handle to a live node of type `T`.
    #[must_use]
    pub fn handle_of<T: 'static>(&self, uuid: Uuid) -> Option<Handle<T>> {
        let (ty, address) = *self.slots.get(&uuid)?;
        if ty != self.registry.type_id::<T>() {
            return None;
        }
        let generation = self.pools.get(&ty)?.generation(address)?;
        Some(Handle::new(ty, address, generation))
    }

    fn node<T: 'static>(&self, handle: Handle<T>) -> Result<&NodeRecord, HandleError> {
        if handle.is_null() {
            return Err(HandleError::Null);
        }
        if handle.type_id() != self.registry.type_id::<T>() {
            return Err(HandleError::TypeMismatch);
        }
        self.pools
            .get(&handle.type_id())
            .and_then(|pool| pool.get(handle.address(), handle.generation()))
            .ok_or(HandleError::Stale)
    }

    /// Finds the row holding the handle's value and the column type to
    /// read it from.
    fn resolve<T: 'static>(&self, handle: Handle<T>) -> StorageResult<(TypeId, Record)> {
        let node = self.node(handle).map_err(|e| {
            tracing::warn!("cannot resolve {:?}: {}", handle, e);
            e
        })?;
        let record = self
            .records
            .get(&node.host)
            .copied()
            .ok_or(StorageError::NotFound(node.host))?;
        Ok((handle.type_id(), record))
    }

    fn slot(&self, uuid: Uuid) -> StorageResult<(TypeId, SlotAddress)> {
        self.slots.get(&uuid).copied().ok_or(StorageError::NotFound(uuid))
    }

    /// Record of an entity that can host components.
    fn host_record(&self, entity: Uuid) -> StorageResult<Record> {
        let (ty, address) = self.slot(entity)?;
        let node = self
            .pools
            .get(&ty)
            .and_then(|pool| pool.get(address, pool.generation(address)?))
            .ok_or(StorageError::NotFound(entity))?;
        if node.kind != NodeKind::Entity {
            return Err(StorageError::KindMismatch {
                expected: NodeKind::Entity,
                found: node.kind,
            });
        }
        self.records.get(&entity).copied().ok_or(StorageError::NotFound(entity))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Every live `T` with the uuid of the row holding it, archetype by
    /// archetype.
    ///
    /// For attached components the uuid is the host entity's.
    pub fn query<T: 'static>(&self) -> impl Iterator<Item = (Uuid, &T)> + '_ {
        let ty = self.registry.type_id::<T>();
        self.index.with_type(ty).flat_map(move |(id, _)| {
            self.index[id]
                .slice::<T>(ty)
                .into_iter()
                .flat_map(|(entities, values)| entities.iter().copied().zip(values))
        })
    }

    /// Mutable form of [`query`](Self::query).
    pub fn query_mut<T: 'static>(&mut self) -> impl Iterator<Item = (Uuid, &mut T)> + '_ {
        let ty = self.registry.type_id::<T>();
        self.index
            .with_type_mut(ty)
            .filter_map(move |(archetype, _)| archetype.slice_mut::<T>(ty))
            .flat_map(|(entities, values)| entities.iter().copied().zip(values.iter_mut()))
    }

    /// Number of live values of type `T`.
    #[must_use]
    pub fn count<T: 'static>(&self) -> usize {
        let ty = self.registry.type_id::<T>();
        self.index.with_type(ty).map(|(id, _)| self.index[id].len()).sum()
    }

    /// Direct children of `parent`.
    pub fn children_of(&self, parent: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        let relation = TypeId::relation(self.child_of, parent);
        self.index
            .with_type(relation)
            .flat_map(move |(id, _)| self.index[id].entities().iter().copied())
    }

    /// Parent of a node created with [`add_child`](Self::add_child).
    #[must_use]
    pub fn parent_of(&self, uuid: Uuid) -> Option<Uuid> {
        let record = self.records.get(&uuid)?;
        self.index[record.archetype]
            .types()
            .iter()
            .find(|t| t.is_relation() && t.kind() == self.child_of)
            .and_then(|t| t.target())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Snapshot of pools, archetypes and locations.
    #[must_use]
    pub fn dump(&self) -> StorageDump {
        let mut pools: Vec<_> = self.pools.iter().collect();
        pools.sort_by_key(|(ty, _)| **ty);

        let mut records: Vec<_> = self.records.iter().map(|(u, r)| (*u, *r)).collect();
        records.sort_by_key(|(uuid, _)| *uuid);

        StorageDump {
            pools: pools
                .into_iter()
                .map(|(ty, pool)| PoolSummary {
                    type_name: self.registry.name(*ty),
                    chunks: pool.chunk_count(),
                    live: pool.allocated_count(),
                })
                .collect(),
            archetypes: self
                .index
                .iter()
                .map(|archetype| ArchetypeSummary {
                    id: archetype.id(),
                    shape: archetype
                        .types()
                        .iter()
                        .map(|t| self.registry.name(*t))
                        .collect(),
                    rows: archetype.len(),
                })
                .collect(),
            records,
        }
    }
}

fn expect_kind<T: Node>(expected: NodeKind) -> StorageResult<()> {
    if T::KIND == expected {
        Ok(())
    } else {
        Err(StorageError::KindMismatch {
            expected,
            found: T::KIND,
        })
    }
}

fn pool_for(
    pools: &mut HashMap<TypeId, PoolAllocator<NodeRecord>>,
    ty: TypeId,
    chunk_capacity: usize,
) -> &mut PoolAllocator<NodeRecord> {
    pools
        .entry(ty)
        .or_insert_with(|| PoolAllocator::new(chunk_capacity))
}
