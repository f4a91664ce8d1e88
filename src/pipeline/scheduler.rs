//! Serial and parallel drivers for the block pipeline.
//!
//! Compression must produce one linearly packed stream with a start table in
//! block-index order, even though blocks may finish compressing in any
//! order. Both drivers therefore compress every block into a private staging
//! buffer sized so a block can never outgrow it, and pack the encoded blocks
//! into the destination in index order — the serial driver as it goes, the
//! parallel driver in a second phase once its workers finish. The staging
//! budget a block sees is a function of the block geometry alone, never of
//! how much destination room remains, so the packed bytes depend only on the
//! input and the parameters: identical for every thread count, scheduling,
//! and destination size that fits them at all.
//!
//! Decompression needs no ordering at all: every block's payload offset is
//! pinned by the start table, so workers decode disjoint output chunks
//! independently.

use log::{debug, trace};
use rayon::prelude::*;

use crate::backends::Backend;
use crate::buffer::AlignedBuf;
use crate::error::BytepressError;
use crate::format::{read_bstart, write_bstart, HeaderInfo, MAX_OVERHEAD};
use crate::pipeline::block::{compress_block, decompress_block};
use crate::pipeline::context::{staging_envelope, BlockParams, Scratch};

//==================================================================================
// 1. Dispatch
//==================================================================================

/// Serial whenever one worker is asked for or the buffer is a single block.
fn effective_threads(requested: usize, nbytes: usize, blocksize: usize) -> usize {
    if nbytes <= blocksize {
        1
    } else {
        requested.max(1)
    }
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool, BytepressError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| BytepressError::ThreadPool(e.to_string()))
}

//==================================================================================
// 2. Compression
//==================================================================================

pub(crate) struct CompressRun<'a> {
    pub params: BlockParams,
    pub src: &'a [u8],
    pub blocksize: usize,
    pub nblocks: usize,
    pub leftover: usize,
    pub header_len: usize,
    pub nthreads: usize,
}

impl CompressRun<'_> {
    fn is_leftover_block(&self, index: usize) -> bool {
        index == self.nblocks - 1 && self.leftover > 0
    }

    fn block_len(&self, index: usize) -> usize {
        if self.is_leftover_block(index) {
            self.leftover
        } else {
            self.blocksize
        }
    }

    fn block_src(&self, index: usize) -> &[u8] {
        let at = index * self.blocksize;
        &self.src[at..at + self.block_len(index)]
    }
}

/// Run the codec path over every block.
///
/// Returns the total artifact length (header included), or `Ok(0)` when the
/// buffer is incompressible within `dest` — the driver may then retry as a
/// verbatim copy.
pub(crate) fn compress_payload(
    run: &CompressRun<'_>,
    dest: &mut [u8],
) -> Result<usize, BytepressError> {
    let threads = effective_threads(run.nthreads, run.src.len(), run.blocksize);
    debug!(
        "compress: {} blocks of {} bytes on {} thread(s)",
        run.nblocks, run.blocksize, threads
    );
    if threads > 1 {
        parallel_compress(run, dest, threads)
    } else {
        serial_compress(run, dest)
    }
}

// The envelope admits the all-raw encoding of any block, so overflowing it
// means the engine broke its own budget math.
fn envelope_overflow(index: usize) -> BytepressError {
    BytepressError::Backend(format!("block {} overflowed its staging envelope", index))
}

fn serial_compress(run: &CompressRun<'_>, dest: &mut [u8]) -> Result<usize, BytepressError> {
    let mut scratch = Scratch::new(run.blocksize, run.params.typesize, run.params.backend)?;
    let destsize = dest.len();
    let (head, payload) = dest.split_at_mut(run.header_len);
    let mut ntbytes = run.header_len;

    for index in 0..run.nblocks {
        let written = compress_block(
            &run.params,
            run.block_src(index),
            run.is_leftover_block(index),
            scratch.tmp2.as_mut_slice(),
            scratch.tmp.as_mut_slice(),
        )?;
        if written == 0 {
            return Err(envelope_overflow(index));
        }
        if ntbytes + written > destsize {
            trace!("block {} does not fit in the remaining destination", index);
            return Ok(0);
        }
        write_bstart(head, index, ntbytes);
        payload[ntbytes - run.header_len..ntbytes - run.header_len + written]
            .copy_from_slice(&scratch.tmp2.as_slice()[..written]);
        ntbytes += written;
    }
    Ok(ntbytes)
}

fn parallel_compress(
    run: &CompressRun<'_>,
    dest: &mut [u8],
    threads: usize,
) -> Result<usize, BytepressError> {
    let pool = build_pool(threads)?;
    let envelope = staging_envelope(run.blocksize, run.params.typesize, run.params.backend);

    // Phase one: every block into per-worker staging, in any order.
    let encoded: Result<Vec<Vec<u8>>, BytepressError> = pool.install(|| {
        (0..run.nblocks)
            .into_par_iter()
            .map_init(
                || Scratch::new(run.blocksize, run.params.typesize, run.params.backend).ok(),
                |scratch, index| {
                    let scratch = scratch
                        .as_mut()
                        .ok_or_else(|| BytepressError::Alloc(envelope))?;
                    let written = compress_block(
                        &run.params,
                        run.block_src(index),
                        run.is_leftover_block(index),
                        scratch.tmp2.as_mut_slice(),
                        scratch.tmp.as_mut_slice(),
                    )?;
                    if written == 0 {
                        return Err(envelope_overflow(index));
                    }
                    Ok(scratch.tmp2.as_slice()[..written].to_vec())
                },
            )
            .collect()
    });
    let encoded = encoded?;

    // Phase two: pack serially in block-index order.
    let destsize = dest.len();
    let (head, payload) = dest.split_at_mut(run.header_len);
    let mut ntbytes = run.header_len;
    for (index, chunk) in encoded.iter().enumerate() {
        if ntbytes + chunk.len() > destsize {
            trace!("pack: block {} exceeds the destination budget", index);
            return Ok(0);
        }
        write_bstart(head, index, ntbytes);
        payload[ntbytes - run.header_len..ntbytes - run.header_len + chunk.len()]
            .copy_from_slice(chunk);
        ntbytes += chunk.len();
    }
    Ok(ntbytes)
}

/// The verbatim pass: raw payload after the (zeroed) start table.
///
/// The caller has already verified the destination fits
/// `header_len + src.len()` bytes.
pub(crate) fn memcpy_compress(
    src: &[u8],
    dest: &mut [u8],
    header_len: usize,
    blocksize: usize,
    nthreads: usize,
) -> Result<usize, BytepressError> {
    // An aborted codec attempt may have recorded block starts; verbatim
    // artifacts carry a zeroed table.
    dest[MAX_OVERHEAD..header_len].fill(0);
    let payload = &mut dest[header_len..header_len + src.len()];
    let threads = effective_threads(nthreads, src.len(), blocksize);
    if threads > 1 {
        let pool = build_pool(threads)?;
        pool.install(|| {
            payload
                .par_chunks_mut(blocksize)
                .zip(src.par_chunks(blocksize))
                .for_each(|(out, raw)| out.copy_from_slice(raw));
        });
    } else {
        payload.copy_from_slice(src);
    }
    Ok(header_len + src.len())
}

//==================================================================================
// 3. Decompression
//==================================================================================

/// Decode every block described by `header` from `src` into `dest`.
///
/// The driver has already checked that `dest` holds `header.nbytes` and
/// resolved the wire code to a decoder.
pub(crate) fn decompress_payload(
    header: &HeaderInfo,
    decoder: &'static Backend,
    src: &[u8],
    dest: &mut [u8],
    nthreads: usize,
) -> Result<usize, BytepressError> {
    if header.is_memcpy() {
        let needed = header.header_len() + header.nbytes;
        if src.len() < needed {
            return Err(BytepressError::HeaderCorrupt(format!(
                "verbatim artifact of {} bytes declares {} bytes of payload",
                src.len(),
                header.nbytes
            )));
        }
    }

    let params = BlockParams {
        backend: decoder,
        clevel: 0,
        typesize: header.typesize,
        shuffle: header.shuffle_requested(),
    };
    let threads = effective_threads(nthreads, header.nbytes, header.blocksize);
    debug!(
        "decompress: {} blocks of {} bytes on {} thread(s)",
        header.nblocks, header.blocksize, threads
    );
    if threads > 1 {
        parallel_decompress(header, &params, src, dest, threads)
    } else {
        serial_decompress(header, &params, src, dest)
    }
}

fn decompress_one_block(
    header: &HeaderInfo,
    params: &BlockParams,
    src: &[u8],
    index: usize,
    out_block: &mut [u8],
    scratch: &mut Scratch,
) -> Result<usize, BytepressError> {
    let block_len = header.block_len(index);
    if header.is_memcpy() {
        let at = header.header_len() + index * header.blocksize;
        out_block.copy_from_slice(&src[at..at + block_len]);
        Ok(block_len)
    } else {
        let bstart = read_bstart(src, header, index)?;
        decompress_block(
            params,
            &src[bstart..],
            block_len,
            header.is_leftover_block(index),
            out_block,
            scratch.tmp.as_mut_slice(),
            scratch.tmp2.as_mut_slice(),
        )
    }
}

fn serial_decompress(
    header: &HeaderInfo,
    params: &BlockParams,
    src: &[u8],
    dest: &mut [u8],
) -> Result<usize, BytepressError> {
    let mut scratch = Scratch::new(header.blocksize, header.typesize, params.backend)?;
    let mut ntbytes = 0usize;
    for (index, out_block) in dest[..header.nbytes].chunks_mut(header.blocksize).enumerate() {
        ntbytes += decompress_one_block(header, params, src, index, out_block, &mut scratch)?;
    }
    Ok(ntbytes)
}

fn parallel_decompress(
    header: &HeaderInfo,
    params: &BlockParams,
    src: &[u8],
    dest: &mut [u8],
    threads: usize,
) -> Result<usize, BytepressError> {
    let pool = build_pool(threads)?;
    pool.install(|| {
        dest[..header.nbytes]
            .par_chunks_mut(header.blocksize)
            .enumerate()
            .map_init(
                || Scratch::new(header.blocksize, header.typesize, params.backend).ok(),
                |scratch, (index, out_block)| {
                    let scratch = scratch
                        .as_mut()
                        .ok_or_else(|| BytepressError::Alloc(header.blocksize))?;
                    decompress_one_block(header, params, src, index, out_block, scratch)
                },
            )
            .try_reduce(|| 0usize, |a, b| Ok(a + b))
    })
}

//==================================================================================
// 4. Partial Decode
//==================================================================================

/// Decode the byte range `[start_byte, stop_byte)` of the logical buffer.
///
/// Single-threaded: the whole point of a partial read is small-range
/// latency, which a worker pool would dwarf. Intersecting blocks are decoded
/// whole into an aligned scratch and the overlap is copied out.
pub(crate) fn getitem_range(
    header: &HeaderInfo,
    decoder: &'static Backend,
    src: &[u8],
    start_byte: usize,
    stop_byte: usize,
    dest: &mut [u8],
) -> Result<usize, BytepressError> {
    let params = BlockParams {
        backend: decoder,
        clevel: 0,
        typesize: header.typesize,
        shuffle: header.shuffle_requested(),
    };
    let mut scratch = Scratch::new(header.blocksize, header.typesize, decoder)?;
    let mut block_buf = AlignedBuf::zeroed(header.blocksize)?;
    let mut ntbytes = 0usize;

    for index in 0..header.nblocks {
        let block_at = index * header.blocksize;
        let block_len = header.block_len(index);

        // Intersection of this block's extent with the requested range.
        let lo = start_byte.max(block_at);
        let hi = stop_byte.min(block_at + block_len);
        if lo >= hi {
            continue;
        }
        let (startb, stopb) = (lo - block_at, hi - block_at);

        if header.is_memcpy() {
            let at = header.header_len() + block_at + startb;
            if src.len() < at + (stopb - startb) {
                return Err(BytepressError::HeaderCorrupt(
                    "verbatim payload past the end of the artifact".into(),
                ));
            }
            dest[ntbytes..ntbytes + stopb - startb].copy_from_slice(&src[at..at + stopb - startb]);
        } else {
            let bstart = read_bstart(src, header, index)?;
            decompress_block(
                &params,
                &src[bstart..],
                block_len,
                header.is_leftover_block(index),
                &mut block_buf.as_mut_slice()[..block_len],
                scratch.tmp.as_mut_slice(),
                scratch.tmp2.as_mut_slice(),
            )?;
            dest[ntbytes..ntbytes + stopb - startb]
                .copy_from_slice(&block_buf.as_slice()[startb..stopb]);
        }
        ntbytes += stopb - startb;
    }

    Ok(ntbytes)
}
