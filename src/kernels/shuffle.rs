//! The byte-transpose ("shuffle") kernel and its inverse.
//!
//! `shuffle` reorganises a row-oriented stream of `typesize`-wide elements
//! into byte planes: plane `k` holds the k-th byte of every element. On
//! numeric data the planes are far more uniform than the interleaved
//! original, which is what makes the downstream entropy coders earn their
//! keep. `unshuffle` is the exact inverse.
//!
//! The common element widths 2, 4, 8 and 16 get monomorphised inner loops
//! (the chunk geometry is a compile-time constant, so the compiler can
//! vectorise them); every other width takes the scalar path. A trailing
//! partial element — possible in the final block when the buffer length is
//! not a multiple of `typesize` — is copied through verbatim.

/// Transpose `src` into byte planes in `dst`.
///
/// `src` and `dst` must have equal lengths. `typesize <= 1` degenerates to a
/// plain copy.
pub fn shuffle(typesize: usize, src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    if typesize <= 1 || src.len() < typesize {
        dst.copy_from_slice(src);
        return;
    }
    let whole = src.len() / typesize * typesize;
    match typesize {
        2 => shuffle_fixed::<2>(&src[..whole], &mut dst[..whole]),
        4 => shuffle_fixed::<4>(&src[..whole], &mut dst[..whole]),
        8 => shuffle_fixed::<8>(&src[..whole], &mut dst[..whole]),
        16 => shuffle_fixed::<16>(&src[..whole], &mut dst[..whole]),
        _ => shuffle_scalar(typesize, &src[..whole], &mut dst[..whole]),
    }
    // Trailing partial element, if any.
    dst[whole..].copy_from_slice(&src[whole..]);
}

/// Inverse of [`shuffle`].
pub fn unshuffle(typesize: usize, src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    if typesize <= 1 || src.len() < typesize {
        dst.copy_from_slice(src);
        return;
    }
    let whole = src.len() / typesize * typesize;
    match typesize {
        2 => unshuffle_fixed::<2>(&src[..whole], &mut dst[..whole]),
        4 => unshuffle_fixed::<4>(&src[..whole], &mut dst[..whole]),
        8 => unshuffle_fixed::<8>(&src[..whole], &mut dst[..whole]),
        16 => unshuffle_fixed::<16>(&src[..whole], &mut dst[..whole]),
        _ => unshuffle_scalar(typesize, &src[..whole], &mut dst[..whole]),
    }
    dst[whole..].copy_from_slice(&src[whole..]);
}

fn shuffle_fixed<const T: usize>(src: &[u8], dst: &mut [u8]) {
    let n = src.len() / T;
    for (i, elem) in src.chunks_exact(T).enumerate() {
        for k in 0..T {
            dst[k * n + i] = elem[k];
        }
    }
}

fn unshuffle_fixed<const T: usize>(src: &[u8], dst: &mut [u8]) {
    let n = dst.len() / T;
    for (i, elem) in dst.chunks_exact_mut(T).enumerate() {
        for k in 0..T {
            elem[k] = src[k * n + i];
        }
    }
}

fn shuffle_scalar(typesize: usize, src: &[u8], dst: &mut [u8]) {
    let n = src.len() / typesize;
    for (i, elem) in src.chunks_exact(typesize).enumerate() {
        for k in 0..typesize {
            dst[k * n + i] = elem[k];
        }
    }
}

fn unshuffle_scalar(typesize: usize, src: &[u8], dst: &mut [u8]) {
    let n = dst.len() / typesize;
    for (i, elem) in dst.chunks_exact_mut(typesize).enumerate() {
        for k in 0..typesize {
            elem[k] = src[k * n + i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(typesize: usize, data: &[u8]) {
        let mut planes = vec![0u8; data.len()];
        let mut back = vec![0u8; data.len()];
        shuffle(typesize, data, &mut planes);
        unshuffle(typesize, &planes, &mut back);
        assert_eq!(back, data, "typesize {} failed to round-trip", typesize);
    }

    #[test]
    fn test_shuffle_u16_exact_layout() {
        let original: Vec<u16> = vec![0x0102, 0x0304, 0x0506];
        let bytes: &[u8] = bytemuck::cast_slice(&original);

        let mut planes = vec![0u8; bytes.len()];
        shuffle(2, bytes, &mut planes);

        // Low bytes first (little-endian hosts), then high bytes.
        assert_eq!(planes, vec![0x02, 0x04, 0x06, 0x01, 0x03, 0x05]);
        roundtrip(2, bytes);
    }

    #[test]
    fn test_shuffle_typesize_one_is_identity() {
        let data: Vec<u8> = (0..=255).collect();
        let mut out = vec![0u8; data.len()];
        shuffle(1, &data, &mut out);
        assert_eq!(out, data);
        roundtrip(1, &data);
    }

    #[test]
    fn test_roundtrip_all_fast_widths() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i * 7 + 3) as u8).collect();
        for typesize in [2, 4, 8, 16] {
            roundtrip(typesize, &data);
        }
    }

    #[test]
    fn test_roundtrip_scalar_widths() {
        let data: Vec<u8> = (0..1071u32).map(|i| (i * 31) as u8).collect();
        // 1071 = 63 * 17: exercises odd widths with and without a tail.
        for typesize in [3, 5, 7, 17, 51] {
            roundtrip(typesize, &data);
        }
    }

    #[test]
    fn test_trailing_partial_element_is_preserved() {
        // 10 bytes of 4-wide elements: two whole elements plus a 2-byte tail.
        let data: Vec<u8> = (1..=10).collect();
        let mut planes = vec![0u8; 10];
        shuffle(4, &data, &mut planes);
        // Planes over the first 8 bytes, tail verbatim.
        assert_eq!(planes, vec![1, 5, 2, 6, 3, 7, 4, 8, 9, 10]);
        roundtrip(4, &data);
    }

    #[test]
    fn test_buffer_shorter_than_typesize_is_copied() {
        let data = vec![7u8, 8, 9];
        let mut out = vec![0u8; 3];
        shuffle(8, &data, &mut out);
        assert_eq!(out, data);
    }
}
