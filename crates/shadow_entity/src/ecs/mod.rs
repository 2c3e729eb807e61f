//! # Entity/Component Storage
//!
//! Archetype-based storage for a node hierarchy.
//!
//! ## Design
//!
//! - Entities and components are both nodes: a uuid plus a kind tag
//! - Every node has a pool slot; its generation backs [`Handle`] checks
//! - Node data lives in archetype columns, one contiguous buffer per type
//! - Type-sets are sorted, so each set maps to exactly one archetype

pub mod archetype;
mod column;
mod dump;
mod handle;
mod index;
mod manager;
mod node;
mod registry;

pub use archetype::{Archetype, ArchetypeId, RowWriter};
pub use column::{Column, ComponentInfo};
pub use dump::{ArchetypeSummary, PoolSummary, StorageDump};
pub use handle::Handle;
pub use index::ArchetypeIndex;
pub use manager::{Record, StorageManager};
pub use node::{Node, NodeKind, NodeRecord, Uuid};
pub use registry::{ChildOf, TypeId, TypeRegistry};
