//! 16-byte-aligned scratch allocation.
//!
//! The shuffle kernels and codec staging areas want 16-byte alignment so a
//! vectorised implementation can load and store full lanes. `AlignedBuf` is a
//! fixed-size, zero-initialised heap buffer with that guarantee; it never
//! resizes and lives only for the duration of a single (de)compression call.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::BytepressError;

/// Alignment required by the vectorisable kernel paths.
pub const SCRATCH_ALIGN: usize = 16;

pub struct AlignedBuf {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

impl AlignedBuf {
    /// Allocate `len` zeroed bytes aligned to [`SCRATCH_ALIGN`].
    pub fn zeroed(len: usize) -> Result<Self, BytepressError> {
        // A zero-size allocation is legal to ask for but not to perform.
        let layout = Layout::from_size_align(len.max(1), SCRATCH_ALIGN)
            .map_err(|_| BytepressError::Alloc(len))?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(BytepressError::Alloc(len))?;
        Ok(Self { ptr, len, layout })
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len bytes for the lifetime of self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for len bytes and uniquely borrowed via &mut self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with the same layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

// SAFETY: AlignedBuf owns its allocation exclusively; no interior sharing.
unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}
