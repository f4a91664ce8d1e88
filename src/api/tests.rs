//! End-to-end suite over the public API: round-trips across the parameter
//! grid, thread-count byte-identity, partial decode, the verbatim fallback,
//! and artifact introspection.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use super::*;
use crate::format::{FLAG_MEMCPY, FLAG_SHUFFLE, MAX_OVERHEAD};
use crate::wire::{load_i32, store_i32};

fn ctx(backend: BackendCode, blocksize: usize, nthreads: usize) -> CodecParams {
    CodecParams {
        backend,
        blocksize,
        nthreads,
    }
}

/// Mildly repetitive bytes: compressible without being trivial.
fn structured(n: usize) -> Vec<u8> {
    (0..n).map(|i| (((i / 7) ^ (i / 113)) & 0xFF) as u8).collect()
}

fn random_bytes(n: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; n];
    rng.fill_bytes(&mut data);
    data
}

/// Compress with generous output space, decompress, compare; returns the
/// truncated artifact.
fn roundtrip_with(
    clevel: u8,
    doshuffle: bool,
    typesize: usize,
    data: &[u8],
    params: &CodecParams,
) -> Vec<u8> {
    let mut dest = vec![0u8; data.len() + data.len() / 2 + 4096];
    let cbytes = compress_ctx(clevel, doshuffle, typesize, data, &mut dest, params).unwrap();
    assert!(cbytes > 0, "compression gave up with ample output space");
    dest.truncate(cbytes);

    let mut back = vec![0u8; data.len()];
    let nbytes = decompress_ctx(&dest, &mut back, params).unwrap();
    assert_eq!(nbytes, data.len());
    assert_eq!(back, data);
    dest
}

//==================================================================================
// Round-trips across the parameter grid
//==================================================================================

#[test]
fn test_roundtrip_every_backend() {
    let data = structured(65_549); // leftover block included
    for backend in [
        BackendCode::Presslz,
        BackendCode::Lz4,
        BackendCode::Lz4hc,
        BackendCode::Snappy,
        BackendCode::Zlib,
    ] {
        for typesize in [1usize, 4, 8, 17] {
            roundtrip_with(5, true, typesize, &data, &ctx(backend, 0, 1));
        }
        roundtrip_with(5, false, 8, &data, &ctx(backend, 0, 1));
    }
}

#[test]
fn test_roundtrip_boundary_sizes() {
    let params = ctx(BackendCode::Presslz, 0, 1);
    for typesize in [1usize, 2, 4, 8, 16, 17] {
        for nbytes in [0usize, 1, typesize, 100, 4096] {
            let data = structured(nbytes);
            roundtrip_with(5, true, typesize, &data, &params);
        }
    }
}

#[test]
fn test_roundtrip_all_levels() {
    let data = structured(200_000);
    for clevel in 0..=9 {
        roundtrip_with(clevel, true, 4, &data, &ctx(BackendCode::Presslz, 0, 1));
    }
}

#[test]
fn test_empty_buffer_is_header_only() {
    let params = ctx(BackendCode::Presslz, 0, 1);
    let artifact = roundtrip_with(5, true, 4, &[], &params);
    let (nbytes, cbytes, _) = cbuffer_sizes(&artifact).unwrap();
    assert_eq!(nbytes, 0);
    assert_eq!(cbytes, MAX_OVERHEAD);
    assert_eq!(artifact.len(), MAX_OVERHEAD);
}

#[test]
fn test_wide_typesize_is_coerced_to_byte_stream() {
    let data = structured(10_000);
    let artifact = roundtrip_with(5, true, 300, &data, &ctx(BackendCode::Presslz, 0, 1));
    let (typesize, _) = cbuffer_metainfo(&artifact).unwrap();
    assert_eq!(typesize, 1);
}

//==================================================================================
// Verbatim (memcpy) mode
//==================================================================================

#[test]
fn test_level_zero_and_small_buffers_imply_memcpy() {
    let params = ctx(BackendCode::Presslz, 0, 1);

    // clevel 0 on a large, compressible buffer.
    let data = structured(100_000);
    let artifact = roundtrip_with(0, true, 4, &data, &params);
    let (_, flags) = cbuffer_metainfo(&artifact).unwrap();
    assert!(flags & FLAG_MEMCPY != 0);
    let header = read_header(&artifact).unwrap();
    assert_eq!(header.cbytes, data.len() + header.header_len());

    // A buffer below MIN_BUFFERSIZE at a high level.
    let small = structured(MIN_BUFFERSIZE - 1);
    let artifact = roundtrip_with(9, true, 1, &small, &params);
    let (_, flags) = cbuffer_metainfo(&artifact).unwrap();
    assert!(flags & FLAG_MEMCPY != 0);
    let header = read_header(&artifact).unwrap();
    assert_eq!(header.cbytes, small.len() + header.header_len());
}

#[test]
fn test_destination_one_byte_short_gives_zero() {
    let data = structured(50_000);
    let params = ctx(BackendCode::Presslz, 0, 1);
    let artifact = roundtrip_with(5, true, 4, &data, &params);

    let mut tight = vec![0u8; artifact.len() - 1];
    let result = compress_ctx(5, true, 4, &data, &mut tight, &params).unwrap();
    assert_eq!(result, 0);
}

#[test]
fn test_memcpy_fallback_fails_when_overhead_does_not_fit() {
    let data = random_bytes(1000, 7);
    let mut dest = vec![0u8; 900];
    let result = compress_ctx(5, false, 1, &data, &mut dest, &ctx(BackendCode::Presslz, 0, 1))
        .unwrap();
    assert_eq!(result, 0);
}

//==================================================================================
// End-to-end scenarios
//==================================================================================

#[test]
fn test_scenario_constant_fill_compresses_hard() {
    let data = vec![0xAAu8; 1 << 20];
    let params = ctx(BackendCode::Presslz, 0, 1);
    let artifact = roundtrip_with(5, true, 4, &data, &params);

    assert!(
        artifact.len() < data.len() / 100,
        "1 MiB of constant fill stayed at {} bytes",
        artifact.len()
    );
    let (_, flags) = cbuffer_metainfo(&artifact).unwrap();
    assert!(flags & FLAG_SHUFFLE != 0);
    assert!(flags & FLAG_MEMCPY == 0);
}

#[test]
fn test_scenario_random_input_falls_back_to_memcpy() {
    let data = random_bytes(1 << 20, 42);
    let params = ctx(BackendCode::Zlib, 0, 1);

    // Exactly enough room for the verbatim artifact: the codec path cannot
    // fit its split prefixes, reports incompressible, and the driver
    // retries as a copy.
    let header_len = MAX_OVERHEAD + 4; // single block
    let mut dest = vec![0u8; data.len() + header_len];
    let cbytes = compress_ctx(9, true, 8, &data, &mut dest, &params).unwrap();
    assert_eq!(cbytes, data.len() + header_len);

    let (_, flags) = cbuffer_metainfo(&dest[..cbytes]).unwrap();
    assert!(flags & FLAG_MEMCPY != 0);
    // The aborted codec pass must not leave a stale start entry behind.
    assert_eq!(load_i32(&dest, MAX_OVERHEAD), 0);

    let mut back = vec![0u8; data.len()];
    assert_eq!(decompress_ctx(&dest[..cbytes], &mut back, &params).unwrap(), data.len());
    assert_eq!(back, data);
}

#[test]
fn test_scenario_arithmetic_sequence_getitem() {
    let values: Vec<i32> = (0..16_384).collect();
    let data: &[u8] = bytemuck::cast_slice(&values);
    let params = ctx(BackendCode::Presslz, 0, 1);
    let artifact = roundtrip_with(1, true, 4, data, &params);

    let mut out = vec![0u8; 10 * 4];
    let n = getitem(&artifact, 100, 10, &mut out).unwrap();
    assert_eq!(n, 40);
    let expected: Vec<i32> = (100..110).collect();
    assert_eq!(out, bytemuck::cast_slice::<i32, u8>(&expected));
}

#[test]
fn test_scenario_thread_count_does_not_change_the_artifact() {
    // Mixed content so some blocks compress and some store raw.
    let mut data = structured(4 << 20);
    let noise = random_bytes(1 << 20, 99);
    data[2 << 20..(2 << 20) + (1 << 20)].copy_from_slice(&noise);

    let serial = roundtrip_with(5, true, 8, &data, &ctx(BackendCode::Presslz, 0, 1));
    let threaded = roundtrip_with(5, true, 8, &data, &ctx(BackendCode::Presslz, 0, 8));
    assert_eq!(serial, threaded);
}

#[test]
fn test_snappy_artifact_is_independent_of_budget_and_threads() {
    // Snappy is the one backend whose worst-case bound exceeds its input,
    // so its encoder needs the full bound's worth of room to attempt a
    // split at all; the staging envelope must provide that room no matter
    // how tight the caller's destination is or how many workers run.
    let mut data = structured(1 << 20);
    let noise = random_bytes(1 << 18, 5);
    data[1 << 19..(1 << 19) + (1 << 18)].copy_from_slice(&noise);

    let serial = ctx(BackendCode::Snappy, 16384, 1);
    let threaded = ctx(BackendCode::Snappy, 16384, 8);
    let generous = roundtrip_with(5, true, 8, &data, &serial);
    assert_eq!(generous, roundtrip_with(5, true, 8, &data, &threaded));

    // A destination with no slack beyond the artifact itself must yield the
    // same bytes again, on one worker and on eight.
    for params in [&serial, &threaded] {
        let mut exact = vec![0u8; generous.len()];
        let cbytes = compress_ctx(5, true, 8, &data, &mut exact, params).unwrap();
        assert_eq!(cbytes, generous.len());
        assert_eq!(exact, generous);
    }
}

#[test]
fn test_scenario_forced_blocksize_block_table() {
    let data = structured(4096);
    let params = ctx(BackendCode::Presslz, 256, 1);
    let artifact = roundtrip_with(5, true, 4, &data, &params);

    let header = read_header(&artifact).unwrap();
    assert_eq!(header.blocksize, 256);
    assert_eq!(header.nblocks, 16);

    // Starts ascend from the end of the table; no block outgrows its
    // geometry (256 payload bytes plus one split prefix).
    let mut starts: Vec<usize> = (0..16)
        .map(|i| load_i32(&artifact, MAX_OVERHEAD + 4 * i) as usize)
        .collect();
    assert_eq!(starts[0], header.header_len());
    starts.push(header.cbytes);
    for pair in starts.windows(2) {
        assert!(pair[0] < pair[1]);
        assert!(pair[1] - pair[0] <= 256 + 4);
        assert!(pair[0] >= header.header_len() && pair[0] < header.cbytes);
    }
}

#[test]
fn test_scenario_corrupt_nbytes_is_rejected_before_writing() {
    let data = structured(10_000);
    let params = ctx(BackendCode::Presslz, 0, 1);
    let mut artifact = roundtrip_with(5, true, 4, &data, &params);

    // Declare more payload than the caller's buffer can hold.
    store_i32(&mut artifact, 4, (data.len() * 4) as i32);

    let mut dest = vec![0u8; data.len()];
    let result = decompress_ctx(&artifact, &mut dest, &params);
    assert!(matches!(result, Err(BytepressError::HeaderCorrupt(_))));
    assert!(dest.iter().all(|&b| b == 0), "destination was written despite the error");
}

//==================================================================================
// Partial decode
//==================================================================================

#[test]
fn test_getitem_matches_slicing_across_blocks() {
    let values: Vec<u64> = (0..40_000).map(|i| i * 31).collect();
    let data: &[u8] = bytemuck::cast_slice(&values);
    let params = ctx(BackendCode::Presslz, 4096, 1);
    let artifact = roundtrip_with(5, true, 8, data, &params);

    // Ranges inside one block, spanning blocks, and at both ends.
    for (start, nitems) in [(0, 1), (0, 512), (511, 2), (1000, 3000), (39_999, 1), (0, 40_000)] {
        let mut out = vec![0u8; nitems * 8];
        let n = getitem(&artifact, start, nitems, &mut out).unwrap();
        assert_eq!(n, nitems * 8);
        assert_eq!(out, data[start * 8..(start + nitems) * 8]);
    }
}

#[test]
fn test_getitem_on_verbatim_artifacts() {
    let data = structured(100);
    let artifact = roundtrip_with(5, false, 4, &data, &ctx(BackendCode::Presslz, 0, 1));
    let (_, flags) = cbuffer_metainfo(&artifact).unwrap();
    assert!(flags & FLAG_MEMCPY != 0);

    let mut out = vec![0u8; 40];
    assert_eq!(getitem(&artifact, 5, 10, &mut out).unwrap(), 40);
    assert_eq!(out, data[20..60]);
}

#[test]
fn test_getitem_bounds_are_checked() {
    let data = structured(4096);
    let artifact = roundtrip_with(5, true, 4, &data, &ctx(BackendCode::Presslz, 0, 1));

    let mut out = vec![0u8; 4096];
    assert!(matches!(
        getitem(&artifact, 1024, 1, &mut out),
        Err(BytepressError::BadArg(_))
    ));
    assert!(matches!(
        getitem(&artifact, 1000, 100, &mut out),
        Err(BytepressError::BadArg(_))
    ));
    assert!(matches!(
        getitem(&artifact, 0, 1024, &mut out[..100]),
        Err(BytepressError::BufferTooSmall { .. })
    ));
}

//==================================================================================
// Parallel decompression
//==================================================================================

#[test]
fn test_parallel_decompression_of_many_blocks() {
    let values: Vec<u32> = (0..(1 << 20)).map(|i| i / 3).collect();
    let data: &[u8] = bytemuck::cast_slice(&values);
    let serial = ctx(BackendCode::Lz4, 0, 1);
    let artifact = roundtrip_with(5, true, 4, data, &serial);

    let threaded = ctx(BackendCode::Lz4, 0, 4);
    let mut back = vec![0u8; data.len()];
    assert_eq!(decompress_ctx(&artifact, &mut back, &threaded).unwrap(), data.len());
    assert_eq!(back, data);
}

//==================================================================================
// Ambient API
//==================================================================================

#[test]
fn test_ambient_configuration_drives_compress() {
    // One test owns every ambient mutation so the assertions cannot race.
    assert!(matches!(
        set_compressor("nonexistent"),
        Err(BytepressError::UnsupportedBackend(_))
    ));

    let code = set_compressor("zlib").unwrap();
    assert_eq!(code, BackendCode::Zlib);
    let previous = set_nthreads(2).unwrap();
    assert!(previous >= 1);
    assert!(set_nthreads(0).is_err());
    set_blocksize(8192);

    let data = structured(300_000);
    let mut dest = vec![0u8; data.len() + 4096];
    let cbytes = compress(6, true, 4, &data, &mut dest).unwrap();
    assert!(cbytes > 0);
    let artifact = &dest[..cbytes];
    assert_eq!(cbuffer_complib(artifact).unwrap(), "zlib");
    assert_eq!(read_header(artifact).unwrap().blocksize, 8192);

    let mut back = vec![0u8; data.len()];
    assert_eq!(decompress(artifact, &mut back).unwrap(), data.len());
    assert_eq!(back, data);

    // Leave the record as other tests expect to find it.
    set_compressor("presslz").unwrap();
    set_nthreads(1).unwrap();
    set_blocksize(0);
}

//==================================================================================
// Introspection and argument validation
//==================================================================================

#[test]
fn test_cbuffer_introspection() {
    let data = structured(100_000);
    let params = ctx(BackendCode::Lz4hc, 0, 1);
    let artifact = roundtrip_with(7, true, 8, &data, &params);

    let (nbytes, cbytes, blocksize) = cbuffer_sizes(&artifact).unwrap();
    assert_eq!(nbytes, data.len());
    assert_eq!(cbytes, artifact.len());
    assert!(blocksize > 0 && blocksize <= nbytes);

    let (typesize, flags) = cbuffer_metainfo(&artifact).unwrap();
    assert_eq!(typesize, 8);
    assert!(flags & FLAG_SHUFFLE != 0);

    let (version, backend_version) = cbuffer_versions(&artifact).unwrap();
    assert_eq!(version, crate::format::FORMAT_VERSION);
    assert_eq!(backend_version, 1);

    // lz4hc artifacts decode with the lz4 decoder and say so.
    assert_eq!(cbuffer_complib(&artifact).unwrap(), "lz4");

    assert!(cbuffer_sizes(&[0u8; 4]).is_err());
}

#[test]
fn test_bad_arguments_are_rejected() {
    let data = structured(1000);
    let mut dest = vec![0u8; 4096];
    let params = ctx(BackendCode::Presslz, 0, 1);

    assert!(matches!(
        compress_ctx(10, true, 4, &data, &mut dest, &params),
        Err(BytepressError::BadArg(_))
    ));
    assert!(matches!(
        compress_ctx(5, true, 0, &data, &mut dest, &params),
        Err(BytepressError::BadArg(_))
    ));
    let zero_threads = ctx(BackendCode::Presslz, 0, 0);
    assert!(matches!(
        compress_ctx(5, true, 4, &data, &mut dest, &zero_threads),
        Err(BytepressError::BadArg(_))
    ));
}

#[test]
fn test_block_starts_point_at_decodable_payloads() {
    let data = structured(100_000);
    let params = ctx(BackendCode::Presslz, 4096, 1);
    let artifact = roundtrip_with(5, true, 4, &data, &params);
    let header = read_header(&artifact).unwrap();

    for index in 0..header.nblocks {
        let start = load_i32(&artifact, MAX_OVERHEAD + 4 * index) as usize;
        assert!(start >= header.header_len() && start < header.cbytes);

        // The split prefix at the start must describe bytes inside the
        // artifact.
        let clen = load_i32(&artifact, start);
        assert!(clen > 0);
        assert!(start + 4 + clen as usize <= header.cbytes);
    }
}

#[test]
fn test_codec_params_serde_defaults() {
    let params: CodecParams = serde_json::from_str("{}").unwrap();
    assert_eq!(params, CodecParams::default());
    assert_eq!(params.backend, BackendCode::Presslz);
    assert_eq!(params.nthreads, 1);

    let params: CodecParams =
        serde_json::from_str(r#"{"backend":"lz4hc","nthreads":4}"#).unwrap();
    assert_eq!(params.backend, BackendCode::Lz4hc);
    assert_eq!(params.nthreads, 4);
    assert_eq!(params.blocksize, 0);
}
