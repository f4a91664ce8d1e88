// ====================================================================================
// ARCHITECTURAL OVERVIEW: The API Layer
// ====================================================================================
//
// This module is the sole public surface of the crate. Two styles are offered
// over one driver:
//
//   1. [Contextual API]  compress_ctx / decompress_ctx
//         `-> takes an explicit `&CodecParams`, touches no shared state.
//             This is the primary interface.
//
//   2. [Ambient API]     compress / decompress / set_nthreads / set_compressor /
//                        set_blocksize
//         `-> reads a single process-wide `Mutex<CodecParams>` record. The
//             lock is held for the entire duration of one call so a
//             reconfiguration can never interleave with a running pass.
//
// Data Flow (Compression):
//
//   caller buffer -> planner (blocksize) -> header write -> scheduler
//     -> per block: shuffle -> split -> backend   (serial or two-phase parallel)
//     -> cbytes patched into the header
//
// Decompression reverses the flow, locating each block's payload through the
// header's start table. `getitem` decodes only the blocks intersecting the
// requested element range.
// ====================================================================================

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::backends::{self, BackendCode};
use crate::error::BytepressError;
use crate::format::{
    self, block_geometry, read_header, HeaderSpec, MAX_BUFFERSIZE, MAX_TYPESIZE, MIN_BUFFERSIZE,
};
use crate::pipeline::context::BlockParams;
use crate::pipeline::scheduler::{self, CompressRun};
use crate::planner::compute_blocksize;

#[cfg(test)]
mod tests;

//==================================================================================
// 1. Configuration
//==================================================================================

/// Explicit parameters for the contextual entry points, and the record the
/// ambient entry points keep behind the process-wide lock.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CodecParams {
    /// Which backend compresses new artifacts. Decompression ignores this:
    /// the artifact names its own decoder.
    #[serde(default)]
    pub backend: BackendCode,

    /// Forced block length in bytes; 0 lets the planner choose.
    #[serde(default)]
    pub blocksize: usize,

    /// Worker count for multi-block buffers.
    #[serde(default = "default_nthreads")]
    pub nthreads: usize,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            backend: BackendCode::default(),
            blocksize: 0,
            nthreads: default_nthreads(),
        }
    }
}

fn default_nthreads() -> usize {
    1
}

/// The ambient configuration record serving the stateless-style API.
static AMBIENT: Mutex<CodecParams> = Mutex::new(CodecParams {
    backend: BackendCode::Presslz,
    blocksize: 0,
    nthreads: 1,
});

fn lock_ambient() -> std::sync::MutexGuard<'static, CodecParams> {
    // A poisoned lock only means another thread panicked mid-call; the
    // record itself is plain data and stays valid.
    AMBIENT.lock().unwrap_or_else(|p| p.into_inner())
}

/// Set the ambient worker count, returning the previous value.
pub fn set_nthreads(nthreads: usize) -> Result<usize, BytepressError> {
    if nthreads == 0 {
        return Err(BytepressError::BadArg("nthreads must be at least 1".into()));
    }
    let mut ambient = lock_ambient();
    let previous = ambient.nthreads;
    ambient.nthreads = nthreads;
    Ok(previous)
}

/// Select the ambient backend by name, returning its code.
pub fn set_compressor(name: &str) -> Result<BackendCode, BytepressError> {
    let code = backends::compname_to_compcode(name)?;
    lock_ambient().backend = code;
    Ok(code)
}

/// Force the ambient block length; 0 restores automatic planning.
pub fn set_blocksize(blocksize: usize) {
    lock_ambient().blocksize = blocksize;
}

//==================================================================================
// 2. Compression
//==================================================================================

/// Compress `src` into `dest` using the ambient configuration.
///
/// Returns the artifact length, or `Ok(0)` when `dest` is too small to hold
/// even the verbatim fallback. The ambient lock is held until the call
/// finishes.
pub fn compress(
    clevel: u8,
    doshuffle: bool,
    typesize: usize,
    src: &[u8],
    dest: &mut [u8],
) -> Result<usize, BytepressError> {
    let ambient = lock_ambient();
    compress_with(clevel, doshuffle, typesize, src, dest, &ambient)
}

/// Compress with explicit parameters; no shared state is read or written.
pub fn compress_ctx(
    clevel: u8,
    doshuffle: bool,
    typesize: usize,
    src: &[u8],
    dest: &mut [u8],
    params: &CodecParams,
) -> Result<usize, BytepressError> {
    compress_with(clevel, doshuffle, typesize, src, dest, params)
}

fn compress_with(
    clevel: u8,
    doshuffle: bool,
    typesize: usize,
    src: &[u8],
    dest: &mut [u8],
    params: &CodecParams,
) -> Result<usize, BytepressError> {
    if clevel > 9 {
        return Err(BytepressError::BadArg(format!(
            "clevel must be in 0..=9, got {}",
            clevel
        )));
    }
    if typesize == 0 {
        return Err(BytepressError::BadArg("typesize 0 is reserved".into()));
    }
    if src.len() > MAX_BUFFERSIZE {
        return Err(BytepressError::BadArg(format!(
            "input of {} bytes exceeds the {} byte format limit",
            src.len(),
            MAX_BUFFERSIZE
        )));
    }
    if params.nthreads == 0 {
        return Err(BytepressError::BadArg("nthreads must be at least 1".into()));
    }

    // Elements wider than the format can express are treated as byte streams.
    let typesize = if typesize > MAX_TYPESIZE { 1 } else { typesize };

    // The wire carries 32-bit offsets; budget beyond that is unreachable.
    let destsize = dest.len().min(i32::MAX as usize);
    let dest = &mut dest[..destsize];

    let backend = backends::lookup(params.backend);
    let blocksize = compute_blocksize(
        params.backend,
        clevel,
        typesize,
        src.len(),
        params.blocksize,
    );
    let (nblocks, leftover) = block_geometry(src.len(), blocksize);

    let header_len = match format::write_header(
        dest,
        &HeaderSpec {
            backend,
            clevel,
            doshuffle,
            typesize,
            nbytes: src.len(),
            blocksize,
            nblocks,
        },
    ) {
        Ok(len) => len,
        // Not enough room for the framing itself: incompressible by definition.
        Err(BytepressError::BufferTooSmall { .. }) => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut memcpy_mode = clevel == 0 || src.len() < MIN_BUFFERSIZE;
    let mut ntbytes = 0usize;

    if !memcpy_mode {
        let run = CompressRun {
            params: BlockParams {
                backend,
                clevel,
                typesize,
                shuffle: doshuffle,
            },
            src,
            blocksize,
            nblocks,
            leftover,
            header_len,
            nthreads: params.nthreads,
        };
        ntbytes = scheduler::compress_payload(&run, dest)?;
        if ntbytes == 0 && src.len() + header_len <= dest.len() {
            // Last chance to fit `src` in `dest`: flip to the verbatim path.
            format::set_memcpy_flag(dest);
            memcpy_mode = true;
        }
    }

    if memcpy_mode {
        if src.len() + header_len > dest.len() {
            return Ok(0);
        }
        ntbytes =
            scheduler::memcpy_compress(src, dest, header_len, blocksize, params.nthreads)?;
    }

    if ntbytes == 0 {
        return Ok(0);
    }
    format::patch_cbytes(dest, ntbytes);
    Ok(ntbytes)
}

//==================================================================================
// 3. Decompression
//==================================================================================

/// Decompress an artifact into `dest` using the ambient configuration.
pub fn decompress(src: &[u8], dest: &mut [u8]) -> Result<usize, BytepressError> {
    let ambient = lock_ambient();
    decompress_with(src, dest, ambient.nthreads)
}

/// Decompress with explicit parameters; only `nthreads` is consulted (the
/// artifact names its own backend and block geometry).
pub fn decompress_ctx(
    src: &[u8],
    dest: &mut [u8],
    params: &CodecParams,
) -> Result<usize, BytepressError> {
    decompress_with(src, dest, params.nthreads)
}

fn decompress_with(
    src: &[u8],
    dest: &mut [u8],
    nthreads: usize,
) -> Result<usize, BytepressError> {
    if nthreads == 0 {
        return Err(BytepressError::BadArg("nthreads must be at least 1".into()));
    }
    let header = read_header(src)?;
    if header.nbytes > dest.len() {
        // A header declaring more payload than the caller can accept is not
        // trusted any further.
        return Err(BytepressError::HeaderCorrupt(format!(
            "declared payload of {} bytes exceeds the {}-byte destination",
            header.nbytes,
            dest.len()
        )));
    }
    if header.nbytes == 0 {
        return Ok(0);
    }
    let decoder = backends::lookup_wire(header.wire_code())?;
    scheduler::decompress_payload(&header, decoder, src, dest, nthreads)
}

//==================================================================================
// 4. Partial Decode
//==================================================================================

/// Decode `nitems` elements starting at element `start` into `dest`.
///
/// Single-threaded by design; returns the number of bytes written.
pub fn getitem(
    src: &[u8],
    start: usize,
    nitems: usize,
    dest: &mut [u8],
) -> Result<usize, BytepressError> {
    let header = read_header(src)?;

    let start_byte = start
        .checked_mul(header.typesize)
        .ok_or_else(|| BytepressError::BadArg("start out of range".into()))?;
    let stop_byte = start
        .checked_add(nitems)
        .and_then(|stop| stop.checked_mul(header.typesize))
        .ok_or_else(|| BytepressError::BadArg("start + nitems out of range".into()))?;
    if start_byte > header.nbytes {
        return Err(BytepressError::BadArg(format!(
            "start element {} is past the {}-byte buffer",
            start, header.nbytes
        )));
    }
    if stop_byte > header.nbytes {
        return Err(BytepressError::BadArg(format!(
            "start + nitems = {} is past the {}-byte buffer",
            start + nitems,
            header.nbytes
        )));
    }
    if dest.len() < stop_byte - start_byte {
        return Err(BytepressError::BufferTooSmall {
            needed: stop_byte - start_byte,
            available: dest.len(),
        });
    }
    if start_byte == stop_byte {
        return Ok(0);
    }

    let decoder = backends::lookup_wire(header.wire_code())?;
    scheduler::getitem_range(&header, decoder, src, start_byte, stop_byte, dest)
}

//==================================================================================
// 5. Artifact Introspection
//==================================================================================

/// `(nbytes, cbytes, blocksize)` of an artifact.
pub fn cbuffer_sizes(src: &[u8]) -> Result<(usize, usize, usize), BytepressError> {
    let header = read_header(src)?;
    Ok((header.nbytes, header.cbytes, header.blocksize))
}

/// `(typesize, flags)` of an artifact.
pub fn cbuffer_metainfo(src: &[u8]) -> Result<(usize, u8), BytepressError> {
    let header = read_header(src)?;
    Ok((header.typesize, header.flags))
}

/// `(format_version, backend_format_version)` of an artifact.
pub fn cbuffer_versions(src: &[u8]) -> Result<(u8, u8), BytepressError> {
    let header = read_header(src)?;
    Ok((header.format_version, header.backend_format_version))
}

/// Name of the backend that can decode an artifact.
pub fn cbuffer_complib(src: &[u8]) -> Result<&'static str, BytepressError> {
    let header = read_header(src)?;
    Ok(backends::lookup_wire(header.wire_code())?.name)
}
