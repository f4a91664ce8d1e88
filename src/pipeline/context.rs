//! Shared per-call state for the block engines.

use crate::backends::Backend;
use crate::buffer::AlignedBuf;
use crate::error::BytepressError;

/// The immutable knobs both block engines read. On compression these come
/// from the caller; on decompression they are reconstructed from the header.
#[derive(Clone, Copy)]
pub(crate) struct BlockParams {
    pub backend: &'static Backend,
    pub clevel: u8,
    pub typesize: usize,
    /// The artifact's shuffle flag; the engines additionally skip the
    /// transpose when `typesize == 1`.
    pub shuffle: bool,
}

/// Per-worker scratch, alive for one (de)compression call.
///
/// `tmp` holds one block's worth of shuffled (or decoded-but-still-shuffled)
/// bytes; `tmp2` is the staging envelope: big enough for a fully raw-stored
/// block including its split prefixes, and for the worst-case output of the
/// one backend that can expand.
pub(crate) struct Scratch {
    pub tmp: AlignedBuf,
    pub tmp2: AlignedBuf,
}

impl Scratch {
    pub fn new(
        blocksize: usize,
        typesize: usize,
        backend: &Backend,
    ) -> Result<Self, BytepressError> {
        Ok(Self {
            tmp: AlignedBuf::zeroed(blocksize)?,
            tmp2: AlignedBuf::zeroed(staging_envelope(blocksize, typesize, backend))?,
        })
    }
}

/// Size of a staging buffer that can always hold one encoded block.
pub(crate) fn staging_envelope(blocksize: usize, typesize: usize, backend: &Backend) -> usize {
    4 * typesize + backend.worst_case(blocksize).max(blocksize)
}
