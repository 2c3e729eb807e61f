//! # Pool Allocator
//!
//! Growable set of [`Chunk`]s for one record type.

use crate::error::AllocatorError;

use super::chunk::{Chunk, SlotAddress, DEFAULT_CHUNK_CAPACITY};

/// A pool allocator for fixed-size records.
///
/// Allocation scans the chunks for one with space and creates a new chunk
/// when all are full. Chunks are never released for the pool's lifetime,
/// so addresses stay meaningful until the pool is dropped.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: PoolAllocator<Particle> = PoolAllocator::new(1024);
///
/// let (address, generation) = pool.allocate(Particle::default())?;
/// pool.deallocate(address)?;
/// ```
#[derive(Debug)]
pub struct PoolAllocator<T> {
    /// Owned chunks, in address order.
    chunks: Vec<Chunk<T>>,
    /// Slots per chunk.
    chunk_capacity: usize,
    /// Number of allocated records.
    allocated_count: usize,
}

impl<T> PoolAllocator<T> {
    /// Creates an empty pool. No chunk exists until the first allocation.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_capacity` is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn new(chunk_capacity: usize) -> Self {
        assert!(chunk_capacity > 0, "Capacity must be greater than zero");
        assert!(
            chunk_capacity <= u32::MAX as usize,
            "Capacity cannot exceed u32::MAX"
        );

        Self {
            chunks: Vec::new(),
            chunk_capacity,
            allocated_count: 0,
        }
    }

    /// Returns the number of slots per chunk.
    #[inline]
    #[must_use]
    pub const fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Returns the number of chunks created so far.
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the number of currently allocated records.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Returns the size in bytes of one slot.
    #[inline]
    #[must_use]
    pub const fn item_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    /// Stores `value` in the first chunk with space, creating a chunk if
    /// every existing one is full.
    ///
    /// # Errors
    ///
    /// [`AllocatorError::AddressSpaceExhausted`] if a new chunk's address
    /// range would not fit in `u32`.
    pub fn allocate(&mut self, value: T) -> Result<(SlotAddress, u32), AllocatorError> {
        let index = match self.chunks.iter().position(Chunk::has_space) {
            Some(index) => index,
            None => self.grow()?,
        };

        let allocated = self.chunks[index].allocate(value)?;
        self.allocated_count += 1;
        Ok(allocated)
    }

    /// Frees the record at `address` and returns it.
    ///
    /// # Errors
    ///
    /// [`AllocatorError::NotOwned`] if no chunk owns the address,
    /// [`AllocatorError::DoubleFree`] if the slot is already free.
    pub fn deallocate(&mut self, address: SlotAddress) -> Result<T, AllocatorError> {
        let chunk = self.owner_mut(address)?;
        let value = chunk.deallocate(address)?;
        self.allocated_count -= 1;
        Ok(value)
    }

    /// Checks if some chunk of this pool owns `address`.
    #[inline]
    #[must_use]
    pub fn contains(&self, address: SlotAddress) -> bool {
        self.owner(address).is_some()
    }

    /// Gets the record at `address` if it is live at `generation`.
    #[inline]
    #[must_use]
    pub fn get(&self, address: SlotAddress, generation: u32) -> Option<&T> {
        self.owner(address)?.get(address, generation)
    }

    /// Gets the record at `address` mutably if it is live at `generation`.
    #[inline]
    pub fn get_mut(&mut self, address: SlotAddress, generation: u32) -> Option<&mut T> {
        self.owner_mut(address).ok()?.get_mut(address, generation)
    }

    /// Returns the current generation of the slot at `address`.
    #[inline]
    #[must_use]
    pub fn generation(&self, address: SlotAddress) -> Option<u32> {
        self.owner(address)?.generation(address)
    }

    /// Iterates over all live records, chunk by chunk.
    pub fn iter(&self) -> impl Iterator<Item = (SlotAddress, u32, &T)> {
        self.chunks.iter().flat_map(Chunk::iter)
    }

    fn owner(&self, address: SlotAddress) -> Option<&Chunk<T>> {
        // Chunks are contiguous and equally sized, so the owner is computed
        // rather than searched for.
        let index = address.index() as usize / self.chunk_capacity;
        self.chunks.get(index).filter(|chunk| chunk.contains(address))
    }

    fn owner_mut(&mut self, address: SlotAddress) -> Result<&mut Chunk<T>, AllocatorError> {
        let index = address.index() as usize / self.chunk_capacity;
        self.chunks
            .get_mut(index)
            .filter(|chunk| chunk.contains(address))
            .ok_or(AllocatorError::NotOwned { address })
    }

    fn grow(&mut self) -> Result<usize, AllocatorError> {
        let start = chunk_start(self.chunks.len(), self.chunk_capacity)?;
        self.chunks.push(Chunk::new(start, self.chunk_capacity));
        tracing::debug!(
            "pool<{}> grew to {} chunks",
            std::any::type_name::<T>(),
            self.chunks.len()
        );
        Ok(self.chunks.len() - 1)
    }
}

/// First address of chunk number `index`, if the whole chunk fits in the
/// 32-bit address space.
fn chunk_start(index: usize, capacity: usize) -> Result<u32, AllocatorError> {
    let start = index as u64 * capacity as u64;
    if start + capacity as u64 > u64::from(u32::MAX) + 1 {
        return Err(AllocatorError::AddressSpaceExhausted);
    }
    u32::try_from(start).map_err(|_| AllocatorError::AddressSpaceExhausted)
}

impl<T> Default for PoolAllocator<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_CAPACITY)
    }
}
