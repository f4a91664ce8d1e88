//! The per-block engines: shuffle → split → backend, and the inverse.
//!
//! A block is encoded as `S` splits, each a 4-byte little-endian compressed
//! length followed by its payload. A split whose backend call did not
//! strictly shrink the data is stored raw with `split_clen == split_ulen`,
//! which is also the decoder's raw marker. Storing raw (rather than keeping
//! an expanded encoding) keeps the emitted bytes independent of how much
//! budget the caller happened to have, so serial and parallel runs produce
//! identical artifacts.

use crate::buffer::SCRATCH_ALIGN;
use crate::error::BytepressError;
use crate::format::split_count;
use crate::kernels::shuffle::{shuffle, unshuffle};
use crate::pipeline::context::BlockParams;
use crate::wire::{load_i32, store_i32};

/// Compress one block of `input.len()` bytes into `dest`.
///
/// `dest.len()` is the output budget. Returns the number of bytes written,
/// or `Ok(0)` when the block cannot be represented within the budget. The
/// schedulers size their staging buffers so that a block always fits; the
/// destination-too-small outcome is decided when the encoded blocks are
/// packed.
pub(crate) fn compress_block(
    params: &BlockParams,
    input: &[u8],
    leftover_block: bool,
    dest: &mut [u8],
    tmp: &mut [u8],
) -> Result<usize, BytepressError> {
    let typesize = params.typesize;

    let work: &[u8] = if params.shuffle && typesize > 1 {
        shuffle(typesize, input, &mut tmp[..input.len()]);
        &tmp[..input.len()]
    } else {
        input
    };

    let nsplits = split_count(typesize, input.len(), leftover_block);
    let neblock = input.len() / nsplits;
    let mut pos = 0usize;

    for s in 0..nsplits {
        if pos + 4 > dest.len() {
            return Ok(0);
        }
        let prefix_at = pos;
        pos += 4;

        let split = &work[s * neblock..(s + 1) * neblock];
        let maxout = params.backend.worst_case(neblock).min(dest.len() - pos);
        if maxout == 0 {
            return Ok(0);
        }

        let mut clen = params
            .backend
            .compress(params.clevel, split, &mut dest[pos..pos + maxout])?;
        if clen > maxout {
            return Err(BytepressError::Backend(format!(
                "{} wrote {} bytes into a {}-byte budget",
                params.backend.name, clen, maxout
            )));
        }
        if clen == 0 || clen >= neblock {
            // The backend could not shrink this split: store it raw.
            if neblock > dest.len() - pos {
                return Ok(0);
            }
            dest[pos..pos + neblock].copy_from_slice(split);
            clen = neblock;
        }

        store_i32(dest, prefix_at, clen as i32);
        pos += clen;
    }

    Ok(pos)
}

/// Decompress one block of `block_len` bytes from `src` into `out`.
///
/// `src` starts at the block's recorded payload offset and extends to the
/// end of the artifact buffer; every split read is bounds-checked against
/// it. `out` must be exactly `block_len` bytes.
pub(crate) fn decompress_block(
    params: &BlockParams,
    src: &[u8],
    block_len: usize,
    leftover_block: bool,
    out: &mut [u8],
    tmp: &mut [u8],
    tmp2: &mut [u8],
) -> Result<usize, BytepressError> {
    let typesize = params.typesize;
    let shuffled = params.shuffle && typesize > 1;
    let nsplits = split_count(typesize, block_len, leftover_block);
    let neblock = block_len / nsplits;

    {
        // Shuffled payloads decode into tmp so the transpose can be undone
        // afterwards; plain payloads decode straight into the destination.
        let target: &mut [u8] = if shuffled {
            &mut tmp[..block_len]
        } else {
            &mut out[..block_len]
        };

        let mut ip = 0usize;
        for s in 0..nsplits {
            if ip + 4 > src.len() {
                return Err(BytepressError::HeaderCorrupt(
                    "split length prefix past the end of the artifact".into(),
                ));
            }
            let clen = load_i32(src, ip);
            ip += 4;
            if clen < 0 {
                return Err(BytepressError::HeaderCorrupt(format!(
                    "negative split length {}",
                    clen
                )));
            }
            let clen = clen as usize;
            if ip + clen > src.len() {
                return Err(BytepressError::HeaderCorrupt(
                    "split payload past the end of the artifact".into(),
                ));
            }

            let split_out = &mut target[s * neblock..(s + 1) * neblock];
            if clen == neblock {
                split_out.copy_from_slice(&src[ip..ip + clen]);
            } else {
                let n = params.backend.decompress(&src[ip..ip + clen], split_out)?;
                if n != neblock {
                    return Err(BytepressError::Backend(format!(
                        "{} decoded {} bytes, expected {}",
                        params.backend.name, n, neblock
                    )));
                }
            }
            ip += clen;
        }
    }

    if shuffled {
        if out.as_ptr() as usize % SCRATCH_ALIGN == 0 {
            unshuffle(typesize, &tmp[..block_len], &mut out[..block_len]);
        } else {
            // Unaligned destination: bounce through the aligned scratch so a
            // vectorised unshuffle never stores to an unaligned base.
            unshuffle(typesize, &tmp[..block_len], &mut tmp2[..block_len]);
            out[..block_len].copy_from_slice(&tmp2[..block_len]);
        }
    }

    Ok(block_len)
}
