//! # Nodes
//!
//! Entities and components are the same kind of record: a node with a
//! process-unique uuid and a kind tag.

use std::fmt;

use crate::error::StorageResult;

use super::manager::StorageManager;

/// Process-unique identity of a node.
///
/// Assigned from a per-manager counter that starts at 1, so a valid uuid
/// is never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Uuid(u32);

impl Uuid {
    /// Creates a uuid from its raw value.
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

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a node is an entity or a plain component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A node that can own children and components.
    Entity,
    /// A leaf data node.
    Component,
}

/// A type that can be stored as a node.
///
/// # Example
///
/// ```rust,ignore
/// struct Player { name: String }
///
/// impl Node for Player {
///     const KIND: NodeKind = NodeKind::Entity;
///
///     fn on_added(manager: &mut StorageManager, this: Uuid) -> StorageResult<()> {
///         manager.add_child(this, Position::new(10.0, 0.0, 0.0))?;
///         Ok(())
///     }
/// }
/// ```
pub trait Node: Sized + 'static {
    /// Kind tag shared by every value of this type.
    const KIND: NodeKind;

    /// Runs once the node has been stored and has a location.
    ///
    /// Used to attach internal children at creation time.
    ///
    /// # Errors
    ///
    /// Errors propagate to the call that created the node; the node itself
    /// stays alive.
    fn on_added(_manager: &mut StorageManager, _this: Uuid) -> StorageResult<()> {
        Ok(())
    }
}

/// Pool payload for one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeRecord {
    /// The node's own uuid.
    pub uuid: Uuid,
    /// Entity or component.
    pub kind: NodeKind,
    /// The node whose archetype row holds this node's value. Equal to
    /// `uuid` unless the node was attached with `add_component`.
    pub host: Uuid,
}
