//! LZ4 and LZ4HC backend adapters over the `lz4` block API.
//!
//! Both encoders produce the same block format and share one decoder, which
//! is why the registry gives them a single wire code. The fast encoder
//! ignores the level; the HC encoder rescales the core's 1..=9 onto its
//! native 1..=16 range.

use lz4::block::{compress_to_buffer, decompress_to_buffer, CompressionMode};

use crate::error::BytepressError;

/// LZ4 refuses single blocks beyond this size (LZ4_MAX_INPUT_SIZE).
const MAX_INPUT: usize = 0x7E00_0000;

/// Core level -> native HC level: `2k - 1`.
pub(crate) fn hc_level_scale(clevel: u8) -> i32 {
    2 * clevel as i32 - 1
}

pub(crate) fn compress_fast(
    _clevel: u8,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, BytepressError> {
    if input.len() > MAX_INPUT {
        return Err(BytepressError::Backend(
            "lz4: block exceeds the 2 GiB input limit".into(),
        ));
    }
    // The block API reports "would not fit in the destination" as an error;
    // the contract wants that case as a zero.
    match compress_to_buffer(input, None, false, output) {
        Ok(n) => Ok(n),
        Err(_) => Ok(0),
    }
}

pub(crate) fn compress_hc(
    clevel: u8,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, BytepressError> {
    if input.len() > MAX_INPUT {
        return Err(BytepressError::Backend(
            "lz4hc: block exceeds the 2 GiB input limit".into(),
        ));
    }
    let mode = CompressionMode::HIGHCOMPRESSION(hc_level_scale(clevel));
    match compress_to_buffer(input, Some(mode), false, output) {
        Ok(n) => Ok(n),
        Err(_) => Ok(0),
    }
}

pub(crate) fn decompress(input: &[u8], output: &mut [u8]) -> Result<usize, BytepressError> {
    decompress_to_buffer(input, Some(output.len() as i32), output)
        .map_err(|e| BytepressError::Backend(format!("lz4: {}", e)))
}
