//! bytepress: a blocked, shuffled, multi-threaded compression codec for
//! homogeneous typed buffers.
//!
//! Given a contiguous byte buffer logically composed of fixed-size elements,
//! the crate produces a self-describing compressed artifact and reconstructs
//! the original buffer (or element-range slices of it) from that artifact.
//! Three mechanisms carry the weight:
//!
//! 1. A byte transpose ("shuffle") applied per block, grouping the k-th byte
//!    of every element so downstream entropy coders see long, low-entropy
//!    runs on numeric data.
//! 2. A block/split pipeline that slices the input into cache-friendly
//!    blocks, splits each block along the shuffle axis, and drives an
//!    interchangeable backend per split.
//! 3. A parallel block scheduler whose packed output layout is identical for
//!    every thread count.
//!
//! The primary interface is the contextual one ([`compress_ctx`],
//! [`decompress_ctx`]) taking an explicit [`CodecParams`]; the ambient
//! entry points ([`compress`], [`decompress`], [`set_compressor`], ...) wrap a
//! single process-wide configuration record for callers that want the
//! classic stateless style.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod api;
pub mod backends;
pub mod error;
pub mod format;

mod buffer;
mod kernels;
mod pipeline;
mod planner;
mod wire;

//==================================================================================
// 2. Public Re-exports
//==================================================================================
pub use api::{
    cbuffer_complib, cbuffer_metainfo, cbuffer_sizes, cbuffer_versions, compress, compress_ctx,
    decompress, decompress_ctx, getitem, set_blocksize, set_compressor, set_nthreads, CodecParams,
};
pub use backends::{
    compcode_to_compname, complib_info, compname_to_compcode, is_available, list_compressors,
    BackendCode,
};
pub use error::BytepressError;
pub use format::{MAX_BUFFERSIZE, MAX_OVERHEAD, MAX_SPLITS, MAX_TYPESIZE, MIN_BUFFERSIZE};
