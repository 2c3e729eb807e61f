//! # Type-Erased Columns
//!
//! One column per component type of an archetype. Values are packed in a
//! single contiguous allocation described by a [`ComponentInfo`].

// SAFETY: Columns manage raw, type-erased memory. Every unsafe block
// states the invariant it relies on.
#![allow(unsafe_code)]

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;

/// Per-type vtable: layout, destructor and display name.
#[derive(Clone, Copy, Debug)]
pub struct ComponentInfo {
    type_id: std::any::TypeId,
    name: &'static str,
    layout: Layout,
    drop: Option<unsafe fn(*mut u8)>,
}

/// Drops the `T` stored at `ptr`.
///
/// # Safety
///
/// `ptr` must point to an initialized, properly aligned `T`.
unsafe fn drop_ptr<T>(ptr: *mut u8) {
    ptr.cast::<T>().drop_in_place();
}

impl ComponentInfo {
    /// Describes `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        let full = std::any::type_name::<T>();
        let name = if full.contains('<') {
            full
        } else {
            full.rsplit("::").next().unwrap_or(full)
        };

        Self {
            type_id: std::any::TypeId::of::<T>(),
            name,
            layout: Layout::new::<T>(),
            drop: std::mem::needs_drop::<T>().then_some(drop_ptr::<T> as unsafe fn(*mut u8)),
        }
    }

    /// Short display name of the type.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Memory layout of one value.
    #[inline]
    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Checks if this describes `T`.
    #[inline]
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == std::any::TypeId::of::<T>()
    }

    /// Checks if values occupy no memory.
    #[inline]
    #[must_use]
    pub const fn is_zero_sized(&self) -> bool {
        self.layout.size() == 0
    }
}

/// Contiguous, growable storage for values of one type.
///
/// Only `len` leading slots are initialized. Zero-sized types never
/// allocate.
#[derive(Debug)]
pub struct Column {
    info: ComponentInfo,
    data: NonNull<u8>,
    len: usize,
    capacity: usize,
}

impl Column {
    /// Creates an empty column for the described type.
    #[must_use]
    pub fn new(info: ComponentInfo) -> Self {
        let capacity = if info.is_zero_sized() { usize::MAX } else { 0 };
        Self {
            info,
            data: dangling(info.layout),
            len: 0,
            capacity,
        }
    }

    /// The column's type description.
    #[inline]
    #[must_use]
    pub const fn info(&self) -> &ComponentInfo {
        &self.info
    }

    /// Number of initialized values.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if the column holds no value.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ensures room for `additional` more values without reallocating.
    ///
    /// This is the only operation that can move existing values.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.len.checked_add(additional).unwrap_or_else(|| capacity_overflow());
        if required <= self.capacity {
            return;
        }

        let new_capacity = required.max(self.capacity * 2).max(4);
        let new_layout = array_layout(self.info.layout, new_capacity);

        // SAFETY: new_layout has nonzero size (non-tag type, capacity >= 4).
        // The old block holds `len` initialized values that are copied
        // bytewise, which is a move.
        unsafe {
            let new_ptr = alloc(new_layout);
            let Some(new_ptr) = NonNull::new(new_ptr) else {
                handle_alloc_error(new_layout);
            };

            if self.capacity > 0 {
                std::ptr::copy_nonoverlapping(
                    self.data.as_ptr(),
                    new_ptr.as_ptr(),
                    self.len * self.info.layout.size(),
                );
                dealloc(self.data.as_ptr(), array_layout(self.info.layout, self.capacity));
            }

            self.data = new_ptr;
        }
        self.capacity = new_capacity;
    }

    /// Pointer to slot `index`, which may be uninitialized.
    ///
    /// # Safety
    ///
    /// `index` must be below the capacity.
    #[inline]
    unsafe fn slot_ptr(&self, index: usize) -> *mut u8 {
        self.data.as_ptr().add(index * self.info.layout.size())
    }

    /// Writes the first uninitialized slot without advancing `len`.
    ///
    /// # Safety
    ///
    /// Capacity must have been reserved and `T` must be the column's type.
    pub(crate) unsafe fn write_pending<T>(&mut self, value: T) {
        debug_assert_eq!(Layout::new::<T>(), self.info.layout);
        debug_assert!(self.len < self.capacity);
        self.slot_ptr(self.len).cast::<T>().write(value);
    }

    /// Moves the value at `row` of `source` into the first uninitialized
    /// slot of this column without advancing either length.
    ///
    /// The source slot is logically uninitialized afterwards.
    ///
    /// # Safety
    ///
    /// Both columns must have the same type, `row < source.len()` and
    /// capacity must have been reserved here.
    pub(crate) unsafe fn move_pending_from(&mut self, source: &Column, row: usize) {
        debug_assert_eq!(self.info.layout, source.info.layout);
        debug_assert!(row < source.len);
        std::ptr::copy_nonoverlapping(
            source.slot_ptr(row),
            self.slot_ptr(self.len),
            self.info.layout.size(),
        );
    }

    /// Drops the pending value written at `len` (used to unwind an
    /// unfinished row).
    ///
    /// # Safety
    ///
    /// The pending slot must have been initialized.
    pub(crate) unsafe fn drop_pending(&mut self) {
        if let Some(drop) = self.info.drop {
            drop(self.slot_ptr(self.len));
        }
    }

    /// Marks the pending slot as initialized.
    ///
    /// # Safety
    ///
    /// The pending slot must have been initialized.
    pub(crate) unsafe fn commit_pending(&mut self) {
        self.len += 1;
    }

    /// Removes `row` by moving the last value into it.
    ///
    /// When `drop_value` is false the removed value is assumed to have been
    /// moved out already and is forgotten.
    ///
    /// # Safety
    ///
    /// `row < len`.
    pub(crate) unsafe fn swap_remove(&mut self, row: usize, drop_value: bool) {
        debug_assert!(row < self.len);
        let last = self.len - 1;
        let size = self.info.layout.size();

        // Shrink first so a panicking destructor cannot cause a double drop.
        self.len = last;
        if row != last {
            // The removed value ends up in the now-unused tail slot.
            std::ptr::swap_nonoverlapping(self.slot_ptr(row), self.slot_ptr(last), size);
        }

        if drop_value {
            if let Some(drop) = self.info.drop {
                drop(self.slot_ptr(last));
            }
        }
    }

    /// Reads the value at `row` bitwise, leaving the slot logically
    /// uninitialized.
    ///
    /// # Safety
    ///
    /// `row < len`, `T` must be the column's type, and the slot must be
    /// forgotten (not dropped) afterwards.
    pub(crate) unsafe fn read<T>(&self, row: usize) -> T {
        debug_assert_eq!(Layout::new::<T>(), self.info.layout);
        debug_assert!(row < self.len);
        self.slot_ptr(row).cast::<T>().read()
    }

    /// Views the column as a typed slice, or `None` if `T` is not the
    /// column's type.
    #[inline]
    #[must_use]
    pub fn as_slice<T: 'static>(&self) -> Option<&[T]> {
        if !self.info.is::<T>() {
            return None;
        }
        // SAFETY: type checked above; the first `len` slots are initialized.
        Some(unsafe { std::slice::from_raw_parts(self.data.as_ptr().cast::<T>(), self.len) })
    }

    /// Views the column as a mutable typed slice, or `None` if `T` is not
    /// the column's type.
    #[inline]
    pub fn as_mut_slice<T: 'static>(&mut self) -> Option<&mut [T]> {
        if !self.info.is::<T>() {
            return None;
        }
        // SAFETY: type checked above; exclusive access through &mut self.
        Some(unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr().cast::<T>(), self.len) })
    }

    /// Gets the value at `row`.
    #[inline]
    #[must_use]
    pub fn get<T: 'static>(&self, row: usize) -> Option<&T> {
        self.as_slice::<T>()?.get(row)
    }

    /// Gets the value at `row` mutably.
    #[inline]
    pub fn get_mut<T: 'static>(&mut self, row: usize) -> Option<&mut T> {
        self.as_mut_slice::<T>()?.get_mut(row)
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        // SAFETY: the first `len` slots are initialized; the block was
        // allocated with array_layout(layout, capacity) when capacity > 0.
        unsafe {
            if let Some(drop) = self.info.drop {
                for i in 0..self.len {
                    drop(self.slot_ptr(i));
                }
            }
            if !self.info.is_zero_sized() && self.capacity > 0 {
                dealloc(self.data.as_ptr(), array_layout(self.info.layout, self.capacity));
            }
        }
    }
}

fn dangling(layout: Layout) -> NonNull<u8> {
    // An aligned, non-null address that is never dereferenced for more
    // than zero bytes.
    NonNull::new(layout.align() as *mut u8).unwrap_or(NonNull::dangling())
}

fn array_layout(item: Layout, count: usize) -> Layout {
    let size = item
        .size()
        .checked_mul(count)
        .unwrap_or_else(|| capacity_overflow());
    Layout::from_size_align(size, item.align()).unwrap_or_else(|_| capacity_overflow())
}

fn capacity_overflow() -> ! {
    panic!("column capacity overflow");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropCounter(Rc<Cell<usize>>, u32);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn push<T: 'static>(column: &mut Column, value: T) {
        column.reserve(1);
        unsafe {
            column.write_pending(value);
            column.commit_pending();
        }
    }

    #[test]
    fn test_column_push_and_grow() {
        let mut column = Column::new(ComponentInfo::of::<u64>());
        for i in 0..100u64 {
            push(&mut column, i);
        }

        assert_eq!(column.len(), 100);
        let values = column.as_slice::<u64>().unwrap();
        assert_eq!(values[0], 0);
        assert_eq!(values[99], 99);
    }

    #[test]
    fn test_column_swap_remove_moves_last() {
        let mut column = Column::new(ComponentInfo::of::<u32>());
        for i in 0..4u32 {
            push(&mut column, i);
        }

        unsafe { column.swap_remove(1, true) };
        assert_eq!(column.as_slice::<u32>().unwrap(), &[0, 3, 2]);
        assert!(column.as_slice::<i32>().is_none());
    }

    #[test]
    fn test_column_drops_exactly_once() {
        let drops = Rc::new(Cell::new(0));
        let mut column = Column::new(ComponentInfo::of::<DropCounter>());
        for i in 0..3 {
            push(&mut column, DropCounter(drops.clone(), i));
        }

        unsafe { column.swap_remove(0, true) };
        assert_eq!(drops.get(), 1);
        assert_eq!(column.get::<DropCounter>(0).unwrap().1, 2);

        let taken = unsafe {
            let value = column.read::<DropCounter>(0);
            column.swap_remove(0, false);
            value
        };
        assert_eq!(taken.1, 2);
        assert_eq!(drops.get(), 1);
        drop(taken);
        assert_eq!(drops.get(), 2);

        drop(column);
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn test_tag_column_never_allocates() {
        struct Tag;
        let mut column = Column::new(ComponentInfo::of::<Tag>());
        assert!(column.info().is_zero_sized());
        for _ in 0..10 {
            push(&mut column, Tag);
        }
        assert_eq!(column.len(), 10);
    }

    #[test]
    fn test_component_info_short_name() {
        struct Player;
        assert_eq!(ComponentInfo::of::<Player>().name(), "Player");
    }
}
