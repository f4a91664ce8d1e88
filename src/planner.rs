//! The blocksize planner.
//!
//! Chooses how much input each block carries, from the backend, the
//! compression level, the element width and the buffer size. The shape of
//! the policy: fast codecs want blocks resident in L1 while slow high-ratio
//! codecs (zlib, LZ4HC) amortise their startup over much larger working
//! sets; higher levels buy ratio with bigger blocks; small buffers get
//! SIMD-friendly strides for the common numeric widths.

use log::debug;

use crate::backends::BackendCode;
use crate::format::{L1_CACHE_SIZE, MIN_BUFFERSIZE};

/// Window cap for the house codec: its hash chains stop paying off past
/// 64 Ki elements per block.
const PRESSLZ_MAX_ELEMENTS: usize = 64 * 1024;

/// Compute the block length for a compression run.
///
/// `forced` is a caller override (0 means automatic). The result is positive,
/// at most `nbytes`, and a multiple of `typesize` whenever it exceeds one
/// element; the single degenerate case is `nbytes < typesize`, where the
/// buffer is treated as a lone 1-byte-grain block.
pub(crate) fn compute_blocksize(
    backend: BackendCode,
    clevel: u8,
    typesize: usize,
    nbytes: usize,
    forced: usize,
) -> usize {
    // Protection against very small buffers.
    if nbytes < typesize {
        return 1;
    }

    let mut blocksize = nbytes;

    if forced > 0 {
        blocksize = forced.max(MIN_BUFFERSIZE);
    } else if nbytes >= 4 * L1_CACHE_SIZE {
        blocksize = 4 * L1_CACHE_SIZE;

        // Codecs designed for large blocks show sizable overheads on small
        // ones; hand them eight times the working set.
        if matches!(backend, BackendCode::Zlib | BackendCode::Lz4hc) {
            blocksize *= 8;
        }

        blocksize = match clevel {
            0 => blocksize / 16,
            1..=3 => blocksize / 8,
            4..=5 => blocksize / 4,
            6 => blocksize / 2,
            7 | 8 => blocksize,
            _ => blocksize * 2,
        };
    } else if nbytes > 256 && matches!(typesize, 2 | 4 | 8 | 16) {
        // Align to the vector stride so the fixed-width shuffle paths run
        // over whole lanes.
        blocksize -= blocksize % (16 * typesize);
    }

    if blocksize > nbytes {
        blocksize = nbytes;
    }
    if blocksize > typesize {
        blocksize = blocksize / typesize * typesize;
    }
    if backend == BackendCode::Presslz && blocksize / typesize > PRESSLZ_MAX_ELEMENTS {
        blocksize = PRESSLZ_MAX_ELEMENTS * typesize;
    }

    debug!(
        "planner: backend={:?} clevel={} typesize={} nbytes={} forced={} -> blocksize={}",
        backend, clevel, typesize, nbytes, forced, blocksize
    );
    blocksize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_tiny_buffer() {
        assert_eq!(compute_blocksize(BackendCode::Presslz, 5, 8, 3, 0), 1);
        assert_eq!(compute_blocksize(BackendCode::Presslz, 5, 4, 0, 0), 1);
    }

    #[test]
    fn test_forced_blocksize_clamps_to_minimum() {
        assert_eq!(compute_blocksize(BackendCode::Presslz, 5, 4, 1 << 20, 64), MIN_BUFFERSIZE);
        assert_eq!(compute_blocksize(BackendCode::Presslz, 5, 4, 4096, 256), 256);
    }

    #[test]
    fn test_level_scaling_for_large_buffers() {
        let nbytes = 16 << 20;
        let base = 4 * L1_CACHE_SIZE;
        assert_eq!(compute_blocksize(BackendCode::Lz4, 0, 4, nbytes, 0), base / 16);
        assert_eq!(compute_blocksize(BackendCode::Lz4, 2, 4, nbytes, 0), base / 8);
        assert_eq!(compute_blocksize(BackendCode::Lz4, 5, 4, nbytes, 0), base / 4);
        assert_eq!(compute_blocksize(BackendCode::Lz4, 6, 4, nbytes, 0), base / 2);
        assert_eq!(compute_blocksize(BackendCode::Lz4, 8, 4, nbytes, 0), base);
        assert_eq!(compute_blocksize(BackendCode::Lz4, 9, 4, nbytes, 0), base * 2);
    }

    #[test]
    fn test_slow_codecs_get_larger_blocks() {
        let nbytes = 64 << 20;
        let fast = compute_blocksize(BackendCode::Lz4, 7, 8, nbytes, 0);
        let slow = compute_blocksize(BackendCode::Zlib, 7, 8, nbytes, 0);
        assert_eq!(slow, fast * 8);
        let hc = compute_blocksize(BackendCode::Lz4hc, 7, 8, nbytes, 0);
        assert_eq!(hc, slow);
    }

    #[test]
    fn test_simd_stride_alignment_for_medium_buffers() {
        // 300 bytes of u32: aligned down to a multiple of 16 * 4.
        assert_eq!(compute_blocksize(BackendCode::Lz4, 5, 4, 300, 0), 256);
        // Non-vector width keeps the whole buffer.
        assert_eq!(compute_blocksize(BackendCode::Lz4, 5, 3, 300, 0), 300);
    }

    #[test]
    fn test_result_is_positive_multiple_of_typesize() {
        for &typesize in &[1usize, 2, 3, 4, 7, 8, 16, 17, 255] {
            for &nbytes in &[1usize, 100, 256, 4096, 1 << 20] {
                for clevel in 0..=9u8 {
                    let bs =
                        compute_blocksize(BackendCode::Presslz, clevel, typesize, nbytes, 0);
                    assert!(bs > 0);
                    assert!(bs <= nbytes.max(1));
                    if nbytes >= typesize && bs > typesize {
                        assert_eq!(bs % typesize, 0, "ts={} n={} lvl={}", typesize, nbytes, clevel);
                    }
                }
            }
        }
    }

    #[test]
    fn test_house_codec_window_cap() {
        let nbytes = 1 << 30;
        let bs = compute_blocksize(BackendCode::Presslz, 9, 4, nbytes, 1 << 24);
        assert_eq!(bs, PRESSLZ_MAX_ELEMENTS * 4);
    }
}
