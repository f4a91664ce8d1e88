//! The codec backend registry.
//!
//! Every entropy coder the core can drive is described by a [`Backend`]
//! descriptor: its public code, on-wire code, name, framing version tag and
//! the function values for compress/decompress/worst-case/level-scale. The
//! core selects a descriptor by code and never branches on codec identity
//! anywhere else.
//!
//! The backend contract the descriptors adapt to:
//!
//! - `compress(level, in, out)` writes at most `out.len()` bytes; `Ok(n)`
//!   with `0 < n <= out.len()` on success, `Ok(0)` when the data did not fit
//!   the budget, `Err` on hard failure.
//! - `decompress(in, out)` writes decoded bytes into `out`; the caller
//!   asserts the count equals the expected split length.
//! - `worst_case(n)` bounds the compressed size of `n` bytes; only Snappy's
//!   bound exceeds its input.
//! - `level_scale(k)` maps the core's 0..=9 levels onto the codec's native
//!   range (LZ4HC accepts 1..=16, hence `2k - 1`).
//!
//! `lz4hc` shares its wire code with `lz4`: the two share a decoder, so an
//! artifact does not record which encoder produced it.

pub(crate) mod lz4;
pub(crate) mod presslz;
pub(crate) mod snappy;
pub(crate) mod zlib;

use serde::{Deserialize, Serialize};

use crate::error::BytepressError;

//==================================================================================
// 1. Public Codes
//==================================================================================

/// Public identifier of a compression backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendCode {
    /// The in-crate house LZ codec; always the default.
    Presslz,
    Lz4,
    Lz4hc,
    Snappy,
    Zlib,
}

impl Default for BackendCode {
    fn default() -> Self {
        BackendCode::Presslz
    }
}

//==================================================================================
// 2. Backend Descriptors
//==================================================================================

type CompressFn = fn(u8, &[u8], &mut [u8]) -> Result<usize, BytepressError>;
type DecompressFn = fn(&[u8], &mut [u8]) -> Result<usize, BytepressError>;

pub struct Backend {
    pub code: BackendCode,
    pub name: &'static str,
    /// Value stored in flags bits 5..7 of the artifact header.
    pub wire_code: u8,
    /// Version tag of this codec's framing, stored in header byte 1.
    pub version_format: u8,
    pub library_name: &'static str,
    pub library_version: &'static str,
    compress_fn: CompressFn,
    decompress_fn: DecompressFn,
    worst_case_fn: fn(usize) -> usize,
    level_scale_fn: fn(u8) -> i32,
}

impl Backend {
    #[inline]
    pub(crate) fn compress(
        &self,
        clevel: u8,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, BytepressError> {
        (self.compress_fn)(clevel, input, output)
    }

    #[inline]
    pub(crate) fn decompress(
        &self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, BytepressError> {
        (self.decompress_fn)(input, output)
    }

    /// Upper bound on the compressed size of `n` input bytes.
    #[inline]
    pub fn worst_case(&self, n: usize) -> usize {
        (self.worst_case_fn)(n)
    }

    /// The codec's native level for a core level.
    #[inline]
    pub fn level_scale(&self, clevel: u8) -> i32 {
        (self.level_scale_fn)(clevel)
    }
}

fn identity_bound(n: usize) -> usize {
    n
}

fn identity_level(clevel: u8) -> i32 {
    clevel as i32
}

static PRESSLZ: Backend = Backend {
    code: BackendCode::Presslz,
    name: "presslz",
    wire_code: 0,
    version_format: 1,
    library_name: "presslz",
    library_version: "1.0.0",
    compress_fn: presslz::compress,
    decompress_fn: presslz::decompress,
    worst_case_fn: identity_bound,
    level_scale_fn: identity_level,
};

static LZ4: Backend = Backend {
    code: BackendCode::Lz4,
    name: "lz4",
    wire_code: 1,
    version_format: 1,
    library_name: "lz4",
    library_version: "1.24",
    compress_fn: self::lz4::compress_fast,
    decompress_fn: self::lz4::decompress,
    worst_case_fn: identity_bound,
    level_scale_fn: identity_level,
};

static LZ4HC: Backend = Backend {
    code: BackendCode::Lz4hc,
    name: "lz4hc",
    // Shares the lz4 decoder and therefore the lz4 wire code.
    wire_code: 1,
    version_format: 1,
    library_name: "lz4",
    library_version: "1.24",
    compress_fn: self::lz4::compress_hc,
    decompress_fn: self::lz4::decompress,
    worst_case_fn: identity_bound,
    level_scale_fn: self::lz4::hc_level_scale,
};

static SNAPPY: Backend = Backend {
    code: BackendCode::Snappy,
    name: "snappy",
    wire_code: 2,
    version_format: 1,
    library_name: "snap",
    library_version: "1.1",
    compress_fn: snappy::compress,
    decompress_fn: snappy::decompress,
    worst_case_fn: snappy::worst_case,
    level_scale_fn: identity_level,
};

static ZLIB: Backend = Backend {
    code: BackendCode::Zlib,
    name: "zlib",
    wire_code: 3,
    version_format: 1,
    library_name: "flate2",
    library_version: "1.0",
    compress_fn: zlib::compress,
    decompress_fn: zlib::decompress,
    worst_case_fn: identity_bound,
    level_scale_fn: identity_level,
};

static BACKENDS: [&Backend; 5] = [&PRESSLZ, &LZ4, &LZ4HC, &SNAPPY, &ZLIB];

//==================================================================================
// 3. Registry Queries
//==================================================================================

/// Descriptor for a public backend code.
pub(crate) fn lookup(code: BackendCode) -> &'static Backend {
    match code {
        BackendCode::Presslz => &PRESSLZ,
        BackendCode::Lz4 => &LZ4,
        BackendCode::Lz4hc => &LZ4HC,
        BackendCode::Snappy => &SNAPPY,
        BackendCode::Zlib => &ZLIB,
    }
}

/// Descriptor owning the decoder for an on-wire code. `lz4hc` artifacts
/// resolve to the `lz4` descriptor here.
pub(crate) fn lookup_wire(wire_code: u8) -> Result<&'static Backend, BytepressError> {
    match wire_code {
        0 => Ok(&PRESSLZ),
        1 => Ok(&LZ4),
        2 => Ok(&SNAPPY),
        3 => Ok(&ZLIB),
        other => Err(BytepressError::UnsupportedBackend(format!(
            "unknown wire code {}",
            other
        ))),
    }
}

/// Resolve a backend name to its public code.
pub fn compname_to_compcode(name: &str) -> Result<BackendCode, BytepressError> {
    BACKENDS
        .iter()
        .find(|b| b.name == name)
        .map(|b| b.code)
        .ok_or_else(|| BytepressError::UnsupportedBackend(name.to_string()))
}

/// The registered name of a backend code.
pub fn compcode_to_compname(code: BackendCode) -> &'static str {
    lookup(code).name
}

/// Whether the backend is usable in this build. All five backends are
/// compiled unconditionally, so this is a stable-contract constant.
pub fn is_available(_code: BackendCode) -> bool {
    true
}

/// Underlying library name and version for a backend.
pub fn complib_info(code: BackendCode) -> (&'static str, &'static str) {
    let b = lookup(code);
    (b.library_name, b.library_version)
}

/// Comma-separated names of the backends available in this build.
pub fn list_compressors() -> &'static str {
    "presslz,lz4,lz4hc,snappy,zlib"
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
