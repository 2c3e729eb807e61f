//! # Storage Error Types
//!
//! All errors that can occur in the storage core.

use thiserror::Error;

use crate::ecs::{NodeKind, TypeId, Uuid};
use crate::memory::SlotAddress;

/// Errors raised by chunks and pools.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorError {
    /// The address was not handed out by this chunk or pool.
    #[error("address {address} is not owned by this allocator")]
    NotOwned {
        /// The offending address.
        address: SlotAddress,
    },

    /// The chunk has no free slot left.
    #[error("chunk has no free slot")]
    Exhausted,

    /// The slot at this address is already on the free list.
    #[error("address {address} was already freed")]
    DoubleFree {
        /// The offending address.
        address: SlotAddress,
    },

    /// Creating another chunk would overflow the 32-bit address space.
    #[error("pool address space exhausted")]
    AddressSpaceExhausted,
}

/// Errors raised when resolving a [`Handle`](crate::ecs::Handle).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleError {
    /// The handle was never bound to a node.
    #[error("null handle")]
    Null,

    /// The slot behind the handle was freed or reused.
    #[error("stale handle: target was destroyed or its slot recycled")]
    Stale,

    /// The handle's type does not match the storage it was resolved against.
    #[error("handle type does not match the stored column")]
    TypeMismatch,
}

/// Errors that can occur in the storage manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No node with this uuid is alive.
    #[error("node not found: {0}")]
    NotFound(Uuid),

    /// The node type has the wrong kind for this operation.
    #[error("kind mismatch: expected {expected:?}, found {found:?}")]
    KindMismatch {
        /// Kind required by the operation.
        expected: NodeKind,
        /// Kind declared by the node type.
        found: NodeKind,
    },

    /// The entity already carries a component of this type.
    #[error("entity {entity} already has component {type_name}")]
    DuplicateComponent {
        /// The target entity.
        entity: Uuid,
        /// Display name of the component type.
        type_name: String,
    },

    /// The entity does not carry a component of this type.
    #[error("entity {entity} has no component {type_name}")]
    MissingComponent {
        /// The target entity.
        entity: Uuid,
        /// Display name of the component type.
        type_name: String,
    },

    /// A type-set contained the same type twice.
    #[error("duplicate type {0} in archetype shape")]
    DuplicateType(TypeId),

    /// The archetype has no column for this type.
    #[error("no column for type {0}")]
    ColumnNotFound(TypeId),

    /// A row index past the end of an archetype.
    #[error("row {row} out of bounds (len {len})")]
    RowOutOfBounds {
        /// The requested row.
        row: usize,
        /// Number of rows in the archetype.
        len: usize,
    },

    /// A row was finished before every data column was written.
    #[error("row is missing a value for type {0}")]
    IncompleteRow(TypeId),

    /// The type was never registered with this registry.
    #[error("type {0} is not registered")]
    UnregisteredType(TypeId),

    /// Every uuid the 32-bit counter can issue is taken.
    #[error("uuid space exhausted")]
    UuidExhausted,

    /// A relation id whose kind is not a relation type.
    #[error("type {0} is not a relation kind")]
    InvalidRelation(TypeId),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Allocator failure.
    #[error(transparent)]
    Allocator(#[from] AllocatorError),

    /// Handle resolution failure.
    #[error(transparent)]
    Handle(#[from] HandleError),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
