//! # Chunk
//!
//! A fixed-capacity slab of slots for one record type, with an intrusive
//! free list threaded through the vacant slots.

use std::fmt;

use crate::error::AllocatorError;

/// Number of slots in a chunk unless configured otherwise.
pub const DEFAULT_CHUNK_CAPACITY: usize = 1024;

/// Pool-wide address of a slot.
///
/// Every chunk owns the half-open range `[start, start + capacity)`, so an
/// address names exactly one slot of exactly one chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SlotAddress(u32);

impl SlotAddress {
    /// Creates an address from a raw pool index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw pool index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A single slot. Vacant slots double as free-list links.
#[derive(Debug)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

impl<T> Slot<T> {
    #[inline]
    const fn generation(&self) -> u32 {
        match self {
            Self::Occupied { generation, .. } | Self::Vacant { generation, .. } => *generation,
        }
    }
}

/// Fixed-capacity slab allocator.
///
/// Allocation pops the free-list head and freeing pushes the slot back, so
/// both are O(1) and reuse is LIFO. Freeing bumps the slot's generation,
/// which is what lets handles detect that a slot was recycled.
///
/// # Example
///
/// ```rust,ignore
/// let mut chunk: Chunk<u32> = Chunk::new(0, 1024);
/// let (address, generation) = chunk.allocate(7)?;
/// assert_eq!(chunk.get(address, generation), Some(&7));
/// chunk.deallocate(address)?;
/// assert_eq!(chunk.get(address, generation), None);
/// ```
#[derive(Debug)]
pub struct Chunk<T> {
    /// The slab. Never grows after construction.
    slots: Box<[Slot<T>]>,
    /// Address of the first slot.
    start: u32,
    /// Local index of the free-list head.
    next_free: Option<u32>,
    /// Number of occupied slots.
    live: usize,
}

impl<T> Chunk<T> {
    /// Creates a chunk whose first slot has address `start`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or the address range overflows `u32`.
    #[must_use]
    pub fn new(start: u32, capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            u64::from(start) + capacity as u64 <= u64::from(u32::MAX) + 1,
            "Chunk address range overflows u32"
        );

        let slots: Vec<Slot<T>> = (0..capacity)
            .map(|i| Slot::Vacant {
                generation: 0,
                next_free: (i + 1 < capacity).then(|| (i + 1) as u32),
            })
            .collect();

        Self {
            slots: slots.into_boxed_slice(),
            start,
            next_free: Some(0),
            live: 0,
        }
    }

    /// Returns the number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Checks if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Checks if the free list is non-empty.
    #[inline]
    #[must_use]
    pub const fn has_space(&self) -> bool {
        self.next_free.is_some()
    }

    /// Address of the first slot.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> SlotAddress {
        SlotAddress(self.start)
    }

    /// Checks if `address` lies within `[start, start + capacity)`.
    #[inline]
    #[must_use]
    pub fn contains(&self, address: SlotAddress) -> bool {
        self.local(address).is_some()
    }

    #[inline]
    fn local(&self, address: SlotAddress) -> Option<usize> {
        let offset = address.0.checked_sub(self.start)? as usize;
        (offset < self.slots.len()).then_some(offset)
    }

    /// Stores `value` in the free-list head.
    ///
    /// Returns the slot's address and the generation it was allocated at.
    ///
    /// # Errors
    ///
    /// [`AllocatorError::Exhausted`] if the chunk is full.
    pub fn allocate(&mut self, value: T) -> Result<(SlotAddress, u32), AllocatorError> {
        let head = self.next_free.ok_or(AllocatorError::Exhausted)?;
        let slot = &mut self.slots[head as usize];

        let Slot::Vacant { generation, next_free } = *slot else {
            debug_assert!(false, "free list points at an occupied slot");
            return Err(AllocatorError::Exhausted);
        };

        *slot = Slot::Occupied { generation, value };
        self.next_free = next_free;
        self.live += 1;

        Ok((SlotAddress(self.start + head), generation))
    }

    /// Frees the slot at `address` and returns its value.
    ///
    /// The value is handed back rather than dropped so the caller decides
    /// what happens to it.
    ///
    /// # Errors
    ///
    /// [`AllocatorError::NotOwned`] if the address lies outside this chunk,
    /// [`AllocatorError::DoubleFree`] if the slot is already vacant.
    pub fn deallocate(&mut self, address: SlotAddress) -> Result<T, AllocatorError> {
        let local = self
            .local(address)
            .ok_or(AllocatorError::NotOwned { address })?;
        let slot = &mut self.slots[local];

        if matches!(slot, Slot::Vacant { .. }) {
            return Err(AllocatorError::DoubleFree { address });
        }

        let vacant = Slot::Vacant {
            generation: slot.generation().wrapping_add(1),
            next_free: self.next_free,
        };
        let Slot::Occupied { value, .. } = std::mem::replace(slot, vacant) else {
            unreachable!("slot checked occupied above");
        };

        self.next_free = Some(local as u32);
        self.live -= 1;

        Ok(value)
    }

    /// Returns the current generation of the slot at `address`.
    #[inline]
    #[must_use]
    pub fn generation(&self, address: SlotAddress) -> Option<u32> {
        self.local(address).map(|i| self.slots[i].generation())
    }

    /// Gets the value at `address` if it is occupied at `generation`.
    #[inline]
    #[must_use]
    pub fn get(&self, address: SlotAddress, generation: u32) -> Option<&T> {
        match &self.slots[self.local(address)?] {
            Slot::Occupied { generation: g, value } if *g == generation => Some(value),
            _ => None,
        }
    }

    /// Gets the value at `address` mutably if it is occupied at `generation`.
    #[inline]
    pub fn get_mut(&mut self, address: SlotAddress, generation: u32) -> Option<&mut T> {
        let local = self.local(address)?;
        match &mut self.slots[local] {
            Slot::Occupied { generation: g, value } if *g == generation => Some(value),
            _ => None,
        }
    }

    /// Iterates over occupied slots in address order, skipping free ones.
    pub fn iter(&self) -> impl Iterator<Item = (SlotAddress, u32, &T)> {
        let start = self.start;
        self.slots.iter().enumerate().filter_map(move |(i, slot)| match slot {
            Slot::Occupied { generation, value } => {
                Some((SlotAddress(start + i as u32), *generation, value))
            }
            Slot::Vacant { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_allocate_until_full() {
        let mut chunk: Chunk<u64> = Chunk::new(0, 4);

        for i in 0..4 {
            assert!(chunk.has_space());
            let (address, _) = chunk.allocate(i).unwrap();
            assert_eq!(address.index(), i as u32);
        }

        assert!(!chunk.has_space());
        assert_eq!(chunk.allocate(99), Err(AllocatorError::Exhausted));
        assert_eq!(chunk.len(), 4);
    }

    #[test]
    fn test_chunk_free_list_is_lifo() {
        let mut chunk: Chunk<u8> = Chunk::new(0, 8);
        let a = chunk.allocate(1).unwrap().0;
        let b = chunk.allocate(2).unwrap().0;
        let c = chunk.allocate(3).unwrap().0;

        chunk.deallocate(a).unwrap();
        chunk.deallocate(c).unwrap();
        chunk.deallocate(b).unwrap();

        assert_eq!(chunk.allocate(0).unwrap().0, b);
        assert_eq!(chunk.allocate(0).unwrap().0, c);
        assert_eq!(chunk.allocate(0).unwrap().0, a);
    }

    #[test]
    fn test_chunk_contains_range() {
        let chunk: Chunk<u8> = Chunk::new(16, 16);
        assert!(!chunk.contains(SlotAddress::new(15)));
        assert!(chunk.contains(SlotAddress::new(16)));
        assert!(chunk.contains(SlotAddress::new(31)));
        assert!(!chunk.contains(SlotAddress::new(32)));
    }

    #[test]
    fn test_chunk_rejects_foreign_and_double_free() {
        let mut chunk: Chunk<u8> = Chunk::new(0, 2);
        let (address, _) = chunk.allocate(1).unwrap();

        let foreign = SlotAddress::new(5);
        assert_eq!(
            chunk.deallocate(foreign),
            Err(AllocatorError::NotOwned { address: foreign })
        );

        assert_eq!(chunk.deallocate(address), Ok(1));
        assert_eq!(
            chunk.deallocate(address),
            Err(AllocatorError::DoubleFree { address })
        );
    }

    #[test]
    fn test_chunk_generation_advances_on_free() {
        let mut chunk: Chunk<&str> = Chunk::new(0, 1);
        let (address, first) = chunk.allocate("old").unwrap();
        chunk.deallocate(address).unwrap();

        let (reused, second) = chunk.allocate("new").unwrap();
        assert_eq!(reused, address);
        assert_ne!(first, second);
        assert_eq!(chunk.get(address, first), None);
        assert_eq!(chunk.get(address, second), Some(&"new"));
    }

    #[test]
    fn test_chunk_iter_skips_free_slots() {
        let mut chunk: Chunk<u32> = Chunk::new(0, 4);
        let addresses: Vec<_> = (0..4).map(|i| chunk.allocate(i).unwrap().0).collect();
        chunk.deallocate(addresses[1]).unwrap();
        chunk.deallocate(addresses[2]).unwrap();

        let values: Vec<u32> = chunk.iter().map(|(_, _, v)| *v).collect();
        assert_eq!(values, vec![0, 3]);
    }
}
