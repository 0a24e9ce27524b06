//! Host-side buffer descriptions.
//!
//! The core borrows host arrays for the duration of a run; it never owns
//! them. Because multiple worker threads touch the *same* output array at
//! disjoint, non-overlapping offsets (the scheduler only ever hands out
//! disjoint `Work` ranges), a plain `&mut [T]` per thread is not expressible
//! without splitting the slice up front — which the scheduler cannot do
//! since chunk boundaries aren't known until run time for the dynamic
//! discipline. `HostSlice` carries the same "caller guarantees disjoint
//! access" contract the original implementation made through a raw
//! `void*` buffer pointer, and is the one place in the crate where that
//! contract is made explicit instead of implicit.

use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    InOut,
}

/// An opaque handle to a buffer registered with a `DeviceExecutor`, returned
/// by `set_in_buffer`/`set_out_buffer`. Kernel arguments reference buffers
/// through this handle rather than by comparing host pointers, per the
/// REDESIGN FLAG on argument binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub usize);

/// A borrowed, thread-shareable view over one host array. Cheap to copy —
/// it is only a pointer and a shape, never the data itself — so backends
/// that need to retain it past the call that produced it (an in-process
/// reference backend keeping a buffer table) can just store a copy.
#[derive(Clone, Copy)]
pub struct HostSlice<'a> {
    ptr: *mut u8,
    item_size: usize,
    len: usize,
    direction: Direction,
    _marker: PhantomData<&'a mut ()>,
}

// SAFETY: callers of `bytes_at`/`bytes_at_mut` only ever request
// non-overlapping `[offset, offset+len)` ranges, matching the scheduler's
// invariant that `Work` chunks never overlap. No two threads ever read and
// write the same byte concurrently.
unsafe impl Send for HostSlice<'_> {}
unsafe impl Sync for HostSlice<'_> {}

impl<'a> HostSlice<'a> {
    pub fn from_slice<T>(direction: Direction, data: &'a [T]) -> Self {
        Self {
            ptr: data.as_ptr() as *mut u8,
            item_size: std::mem::size_of::<T>(),
            len: data.len(),
            direction,
            _marker: PhantomData,
        }
    }

    pub fn from_mut_slice<T>(direction: Direction, data: &'a mut [T]) -> Self {
        Self {
            ptr: data.as_mut_ptr() as *mut u8,
            item_size: std::mem::size_of::<T>(),
            len: data.len(),
            direction,
            _marker: PhantomData,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bytes(&self) -> usize {
        self.item_size * self.len
    }

    pub fn by_bytes(&self, items: usize) -> usize {
        self.item_size * items
    }

    /// Host pointer identity, retained only for diagnostics (the original's
    /// address-comparison role is gone; nothing resolves arguments by this
    /// value anymore).
    pub fn address(&self) -> usize {
        self.ptr as usize
    }

    /// Read-only view of `[offset_items, offset_items+len_items)` in bytes.
    pub fn bytes_at(&self, offset_items: usize, len_items: usize) -> &[u8] {
        assert!(offset_items + len_items <= self.len, "buffer range out of bounds");
        let start = self.by_bytes(offset_items);
        let len = self.by_bytes(len_items);
        unsafe { std::slice::from_raw_parts(self.ptr.add(start), len) }
    }

    /// Mutable view of `[offset_items, offset_items+len_items)` in bytes.
    /// Callers must ensure no other live view overlaps this range.
    pub fn bytes_at_mut(&self, offset_items: usize, len_items: usize) -> &mut [u8] {
        assert!(offset_items + len_items <= self.len, "buffer range out of bounds");
        let start = self.by_bytes(offset_items);
        let len = self.by_bytes(len_items);
        unsafe { std::slice::from_raw_parts_mut(self.ptr.add(start), len) }
    }

    pub fn whole_bytes(&self) -> &[u8] {
        self.bytes_at(0, self.len)
    }

    /// Typed read-only view of the whole buffer. Panics if `T`'s size
    /// doesn't match the item size this slice was constructed with.
    pub fn as_slice<T>(&self) -> &[T] {
        assert_eq!(std::mem::size_of::<T>(), self.item_size, "item size mismatch");
        unsafe { std::slice::from_raw_parts(self.ptr as *const T, self.len) }
    }

    /// Typed mutable view of the whole buffer. See [`HostSlice::as_slice`].
    pub fn as_mut_slice<T>(&self) -> &mut [T] {
        assert_eq!(std::mem::size_of::<T>(), self.item_size, "item size mismatch");
        unsafe { std::slice::from_raw_parts_mut(self.ptr as *mut T, self.len) }
    }
}

/// A lightweight description of a buffer's shape, used when allocating the
/// matching device-side buffer. Does not carry the host pointer.
#[derive(Debug, Clone, Copy)]
pub struct BufferDescriptor {
    pub direction: Direction,
    pub item_size: usize,
    pub len: usize,
}

impl BufferDescriptor {
    pub fn bytes(&self) -> usize {
        self.item_size * self.len
    }
}

impl From<&HostSlice<'_>> for BufferDescriptor {
    fn from(slice: &HostSlice<'_>) -> Self {
        Self {
            direction: slice.direction(),
            item_size: slice.item_size(),
            len: slice.len(),
        }
    }
}
