//! # Memory Management
//!
//! Slab storage for node records.
//!
//! ## Design Philosophy
//!
//! Records live in fixed-capacity chunks that are never moved or released
//! while the pool lives:
//! - O(1) allocate and free through an intrusive free list
//! - Per-slot generation counters to detect reuse
//! - Stable addresses for the pool's lifetime

mod chunk;
mod pool;

pub use chunk::{Chunk, SlotAddress, DEFAULT_CHUNK_CAPACITY};
pub use pool::PoolAllocator;
