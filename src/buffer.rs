// src/buffer.rs

//! Owned, register-aligned element storage.
//!
//! Every register load or store in the engine targets an [`AlignedBuffer`].
//! The start address is always a multiple of [`REGISTER_BYTES`], so any
//! offset that is a multiple of the lane width lands on a register boundary.

use crate::element::Element;
use std::alloc::{self, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Width of the widest register the engine targets (512 bits).
pub const REGISTER_BYTES: usize = 64;

/// A fixed-capacity, zero-initialised buffer aligned to [`REGISTER_BYTES`].
pub struct AlignedBuffer<T: Element> {
    ptr: NonNull<T>,
    capacity: usize,
    layout: Layout,
}

// The buffer owns plain numeric data; sharing follows the usual `&`/`&mut` rules.
unsafe impl<T: Element> Send for AlignedBuffer<T> {}
unsafe impl<T: Element> Sync for AlignedBuffer<T> {}

impl<T: Element> AlignedBuffer<T> {
    /// Allocate `capacity` zeroed elements.
    pub fn zeroed(capacity: usize) -> Self {
        let bytes = match capacity.checked_mul(core::mem::size_of::<T>()) {
            Some(bytes) => bytes,
            None => panic!("AlignedBuffer capacity overflow ({} elements)", capacity),
        };
        // Always allocate at least one register so the base address is real
        // and aligned even for empty buffers.
        let padded = bytes.max(1).div_ceil(REGISTER_BYTES) * REGISTER_BYTES;
        let layout = match Layout::from_size_align(padded, REGISTER_BYTES) {
            Ok(layout) => layout,
            Err(_) => panic!("AlignedBuffer capacity overflow ({} bytes)", padded),
        };

        // SAFETY: layout has a non-zero size. Zero bits are a valid value for
        // every `Element` type.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = match NonNull::new(raw.cast::<T>()) {
            Some(ptr) => ptr,
            None => alloc::handle_alloc_error(layout),
        };

        Self {
            ptr,
            capacity,
            layout,
        }
    }

    /// Allocate a buffer holding a copy of `values`.
    pub fn from_slice(values: &[T]) -> Self {
        let mut buffer = Self::zeroed(values.len());
        buffer.copy_from_slice(values);
        buffer
    }

    /// Allocate `capacity` elements initialised from their index.
    pub fn from_fn(capacity: usize, mut f: impl FnMut(usize) -> T) -> Self {
        let mut buffer = Self::zeroed(capacity);
        for (idx, slot) in buffer.iter_mut().enumerate() {
            *slot = f(idx);
        }
        buffer
    }

    /// Number of elements the buffer holds.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: ptr is valid for `capacity` initialised elements.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.capacity) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: ptr is valid for `capacity` initialised elements and we hold `&mut self`.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity) }
    }

    /// Address of the element at `offset` (may be one past the end).
    #[inline]
    pub fn address_of(&self, offset: usize) -> usize {
        self.ptr.as_ptr() as usize + offset * core::mem::size_of::<T>()
    }

    /// Whether the element at `offset` starts on an `align`-byte boundary.
    #[inline]
    pub fn is_aligned_at(&self, offset: usize, align: usize) -> bool {
        align != 0 && self.address_of(offset) % align == 0
    }
}

impl<T: Element> Drop for AlignedBuffer<T> {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with exactly this layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout) }
    }
}

impl<T: Element> Deref for AlignedBuffer<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Element> DerefMut for AlignedBuffer<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Element> Clone for AlignedBuffer<T> {
    fn clone(&self) -> Self {
        Self::from_slice(self.as_slice())
    }
}

impl<T: Element> PartialEq for AlignedBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Element> fmt::Debug for AlignedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("type", &T::NAME)
            .field("capacity", &self.capacity)
            .field("data", &self.as_slice())
            .finish()
    }
}
