//! # Shadow Entity Storage Core
//!
//! Entity/component storage for a node-based scene graph:
//! - Chunked slab pools with generation-checked slots
//! - Archetype tables with one contiguous column per component type
//! - A type -> archetype index for "everything with component X" queries
//! - Handles that report a recycled target instead of dangling
//!
//! ## Architecture Rules
//!
//! 1. **Single-threaded** - every mutation goes through `&mut StorageManager`
//! 2. **Data-oriented design** - values of one type are packed together
//! 3. **Row indices are not stable** - re-derive references after mutation
//!
//! ## Example
//!
//! ```rust,ignore
//! use shadow_entity::{Node, NodeKind, StorageManager};
//!
//! struct Scene;
//! impl Node for Scene {
//!     const KIND: NodeKind = NodeKind::Entity;
//! }
//!
//! let mut storage = StorageManager::new();
//! let scene = storage.add(Scene)?;
//! assert!(storage.is_valid(scene));
//! println!("{}", storage.dump());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::StorageConfig;
pub use ecs::{
    Archetype, ArchetypeId, ArchetypeIndex, ChildOf, Handle, Node, NodeKind, Record,
    StorageDump, StorageManager, TypeId, TypeRegistry, Uuid,
};
pub use error::{AllocatorError, HandleError, StorageError, StorageResult};
pub use memory::{PoolAllocator, SlotAddress};
