//! The single, unified error type for the whole crate.
//!
//! Every fallible operation returns `Result<_, BytepressError>`. Errors are
//! local to one call; there is no global error state. The distinguished
//! "incompressible at this budget" outcome of compression is *not* an error
//! and is reported as `Ok(0)` by the drivers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BytepressError {
    /// A caller-supplied parameter is outside its documented domain
    /// (compression level, typesize, getitem range, thread count).
    #[error("invalid argument: {0}")]
    BadArg(String),

    /// The requested backend name or wire code does not exist in this build.
    #[error("unsupported compression backend: {0}")]
    UnsupportedBackend(String),

    /// The destination buffer cannot hold the required output.
    #[error("destination buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// A codec backend violated its contract: negative status, oversized
    /// output, or a decoded length that does not match the expected one.
    #[error("backend failure: {0}")]
    Backend(String),

    /// The artifact header or its block start table is inconsistent with the
    /// buffer it arrived in.
    #[error("corrupt artifact header: {0}")]
    HeaderCorrupt(String),

    /// Scratch allocation failed.
    #[error("allocation of {0} bytes failed")]
    Alloc(usize),

    /// The worker pool for a parallel pass could not be built.
    #[error("thread pool construction failed: {0}")]
    ThreadPool(String),

    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
