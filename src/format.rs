//! The artifact wire format: constants, flags, and the header codec.
//!
//! This module is the single source of truth for serialization of the
//! compressed artifact's framing:
//!
//! ```text
//! offset  size  field
//!   0      1    format_version
//!   1      1    backend_format_version
//!   2      1    flags        (bit 0 shuffle, bit 1 memcpy, bits 5..7 backend)
//!   3      1    typesize     (1..=255)
//!   4      4    nbytes       LE u32   uncompressed payload length
//!   8      4    blocksize    LE u32   full-block length (last may be short)
//!  12      4    cbytes       LE u32   total artifact length incl. header
//!  16     4*B   bstarts      LE i32   absolute offset of each block payload
//!  16+4B   ..   block payloads, concatenated in block-index order
//! ```
//!
//! The `bstarts` table is always present, even for memcpy artifacts (where
//! its entries stay zero), so the payload region begins at `16 + 4*B` in
//! every mode. Writers borrow the destination slice for the duration of one
//! call; readers parse into an owned [`HeaderInfo`].

use crate::backends::Backend;
use crate::error::BytepressError;
use crate::wire::{load_i32, store_i32};

//==================================================================================
// 1. Format Constants
//==================================================================================

/// Version tag of the core framing written to byte 0.
pub const FORMAT_VERSION: u8 = 2;

/// Size of the fixed header prefix, before the block start table.
pub const MAX_OVERHEAD: usize = 16;

/// Buffers below this size are stored verbatim rather than compressed.
pub const MIN_BUFFERSIZE: usize = 128;

/// Largest element width the shuffle understands; wider inputs are treated
/// as 1-byte streams.
pub const MAX_TYPESIZE: usize = 255;

/// Upper bound on the per-block split count (per-byte splits are only used
/// while `typesize` fits in this many planes).
pub const MAX_SPLITS: usize = 16;

/// Largest input the 32-bit wire fields can describe.
pub const MAX_BUFFERSIZE: usize = i32::MAX as usize - MAX_OVERHEAD;

/// Reference L1 data-cache size used by the blocksize planner.
pub const L1_CACHE_SIZE: usize = 32 * 1024;

/// flags bit 0: the shuffle was requested for this artifact.
pub const FLAG_SHUFFLE: u8 = 0x01;
/// flags bit 1: the payload is the raw buffer, no codec was invoked.
pub const FLAG_MEMCPY: u8 = 0x02;
/// flags bits 5..7 carry the backend wire code.
const WIRE_CODE_SHIFT: u8 = 5;

//==================================================================================
// 2. Block Geometry & Split Policy
//==================================================================================

/// Number of blocks and trailing short-block length for a buffer.
pub(crate) fn block_geometry(nbytes: usize, blocksize: usize) -> (usize, usize) {
    let leftover = nbytes % blocksize;
    let nblocks = nbytes / blocksize + usize::from(leftover > 0);
    (nblocks, leftover)
}

/// The split rule, shared verbatim by the block compressor and decompressor:
/// a block is cut into one split per byte plane only while the planes stay
/// long enough to be worth independent codec calls, and never for the short
/// trailing block.
pub(crate) fn split_count(typesize: usize, block_len: usize, leftover_block: bool) -> usize {
    if typesize <= MAX_SPLITS && typesize >= 1 && block_len / typesize >= MIN_BUFFERSIZE
        && !leftover_block
    {
        typesize
    } else {
        1
    }
}

//==================================================================================
// 3. Header Writer
//==================================================================================

/// Everything the writer needs to emit a header.
pub(crate) struct HeaderSpec<'a> {
    pub backend: &'a Backend,
    pub clevel: u8,
    pub doshuffle: bool,
    pub typesize: usize,
    pub nbytes: usize,
    pub blocksize: usize,
    pub nblocks: usize,
}

/// Emit the fixed prefix and a zeroed `bstarts` table into `dest`.
///
/// Returns the header length (`16 + 4*nblocks`), which is also the write
/// cursor position for the first block payload. `cbytes` is left zero and
/// patched by [`patch_cbytes`] once the scheduler knows the final size.
pub(crate) fn write_header(dest: &mut [u8], spec: &HeaderSpec) -> Result<usize, BytepressError> {
    let header_len = MAX_OVERHEAD + 4 * spec.nblocks;
    if dest.len() < header_len {
        return Err(BytepressError::BufferTooSmall {
            needed: header_len,
            available: dest.len(),
        });
    }

    let mut flags = spec.backend.wire_code << WIRE_CODE_SHIFT;
    if spec.clevel == 0 || spec.nbytes < MIN_BUFFERSIZE {
        // Nothing to gain from the codec: mark the artifact verbatim.
        flags |= FLAG_MEMCPY;
    }
    if spec.doshuffle {
        flags |= FLAG_SHUFFLE;
    }

    dest[0] = FORMAT_VERSION;
    dest[1] = spec.backend.version_format;
    dest[2] = flags;
    dest[3] = spec.typesize as u8;
    store_i32(dest, 4, spec.nbytes as i32);
    store_i32(dest, 8, spec.blocksize as i32);
    store_i32(dest, 12, 0);
    dest[MAX_OVERHEAD..header_len].fill(0);

    Ok(header_len)
}

/// Patch the final artifact length into the `cbytes` field.
pub(crate) fn patch_cbytes(dest: &mut [u8], cbytes: usize) {
    store_i32(dest, 12, cbytes as i32);
}

/// Flip the memcpy bit on an already-written header (the incompressible
/// fallback path).
pub(crate) fn set_memcpy_flag(dest: &mut [u8]) {
    dest[2] |= FLAG_MEMCPY;
}

/// Record the absolute payload offset of block `index`.
pub(crate) fn write_bstart(dest: &mut [u8], index: usize, pos: usize) {
    store_i32(dest, MAX_OVERHEAD + 4 * index, pos as i32);
}

//==================================================================================
// 4. Header Reader
//==================================================================================

/// Parsed view of an artifact header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    pub format_version: u8,
    pub backend_format_version: u8,
    pub flags: u8,
    pub typesize: usize,
    pub nbytes: usize,
    pub blocksize: usize,
    pub cbytes: usize,
    pub nblocks: usize,
    pub leftover: usize,
}

impl HeaderInfo {
    #[inline]
    pub fn shuffle_requested(&self) -> bool {
        self.flags & FLAG_SHUFFLE != 0
    }

    #[inline]
    pub fn is_memcpy(&self) -> bool {
        self.flags & FLAG_MEMCPY != 0
    }

    /// Backend wire code carried in the flags byte.
    #[inline]
    pub fn wire_code(&self) -> u8 {
        self.flags >> WIRE_CODE_SHIFT
    }

    /// Total header length including the block start table.
    #[inline]
    pub fn header_len(&self) -> usize {
        MAX_OVERHEAD + 4 * self.nblocks
    }

    /// Whether block `index` is the short trailing block.
    #[inline]
    pub fn is_leftover_block(&self, index: usize) -> bool {
        index == self.nblocks - 1 && self.leftover > 0
    }

    /// Uncompressed length of block `index`.
    #[inline]
    pub fn block_len(&self, index: usize) -> usize {
        if self.is_leftover_block(index) {
            self.leftover
        } else {
            self.blocksize
        }
    }
}

/// Parse and validate the header of a compressed artifact.
pub fn read_header(src: &[u8]) -> Result<HeaderInfo, BytepressError> {
    if src.len() < MAX_OVERHEAD {
        return Err(BytepressError::HeaderCorrupt(format!(
            "buffer of {} bytes is shorter than the {}-byte header",
            src.len(),
            MAX_OVERHEAD
        )));
    }

    let typesize = src[3] as usize;
    if typesize == 0 {
        return Err(BytepressError::HeaderCorrupt(
            "typesize 0 is reserved".into(),
        ));
    }

    let nbytes = load_i32(src, 4);
    let blocksize = load_i32(src, 8);
    let cbytes = load_i32(src, 12);
    if nbytes < 0 || blocksize <= 0 || cbytes < 0 {
        return Err(BytepressError::HeaderCorrupt(format!(
            "negative or zero size field (nbytes {}, blocksize {}, cbytes {})",
            nbytes, blocksize, cbytes
        )));
    }

    let (nblocks, leftover) = block_geometry(nbytes as usize, blocksize as usize);
    let header_len = MAX_OVERHEAD + 4 * nblocks;
    if src.len() < header_len {
        return Err(BytepressError::HeaderCorrupt(format!(
            "buffer of {} bytes cannot hold a start table for {} blocks",
            src.len(),
            nblocks
        )));
    }

    Ok(HeaderInfo {
        format_version: src[0],
        backend_format_version: src[1],
        flags: src[2],
        typesize,
        nbytes: nbytes as usize,
        blocksize: blocksize as usize,
        cbytes: cbytes as usize,
        nblocks,
        leftover,
    })
}

/// Read the recorded payload offset of block `index`, validated against the
/// source buffer extent.
pub(crate) fn read_bstart(
    src: &[u8],
    header: &HeaderInfo,
    index: usize,
) -> Result<usize, BytepressError> {
    let start = load_i32(src, MAX_OVERHEAD + 4 * index);
    if start < header.header_len() as i32 || start as usize >= src.len() {
        return Err(BytepressError::HeaderCorrupt(format!(
            "block {} start {} is outside the payload region [{}, {})",
            index,
            start,
            header.header_len(),
            src.len()
        )));
    }
    Ok(start as usize)
}

//==================================================================================
// 5. Unit Tests
//==================================================================================
