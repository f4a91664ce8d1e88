//! Snappy backend adapter over `snap`'s raw block format.
//!
//! Snappy is the one backend whose compressed output can exceed its input,
//! so it is also the one whose `worst_case` hook returns more than `n`; the
//! block engine sizes its budget from that bound. `snap` refuses to encode
//! into less than the worst case, which the contract maps to "did not fit".

use snap::raw::{max_compress_len, Decoder, Encoder};

use crate::error::BytepressError;

pub(crate) fn worst_case(n: usize) -> usize {
    max_compress_len(n)
}

pub(crate) fn compress(
    _clevel: u8,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, BytepressError> {
    match Encoder::new().compress(input, output) {
        Ok(n) => Ok(n),
        Err(snap::Error::BufferTooSmall { .. }) => Ok(0),
        Err(e) => Err(BytepressError::Backend(format!("snappy: {}", e))),
    }
}

pub(crate) fn decompress(input: &[u8], output: &mut [u8]) -> Result<usize, BytepressError> {
    Decoder::new()
        .decompress(input, output)
        .map_err(|e| BytepressError::Backend(format!("snappy: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_with_worst_case_budget() {
        let data: Vec<u8> = (0..30_000u32).map(|i| (i % 50) as u8).collect();
        let mut out = vec![0u8; worst_case(data.len())];
        let clen = compress(5, &data, &mut out).unwrap();
        assert!(clen > 0 && clen < data.len());

        let mut back = vec![0u8; data.len()];
        assert_eq!(decompress(&out[..clen], &mut back).unwrap(), data.len());
        assert_eq!(back, data);
    }

    #[test]
    fn test_below_worst_case_budget_reports_no_fit() {
        let data = vec![1u8; 1000];
        let mut out = vec![0u8; worst_case(data.len()) - 1];
        assert_eq!(compress(5, &data, &mut out).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_stream_is_an_error() {
        let mut out = vec![0u8; 64];
        assert!(decompress(&[0xFF, 0xFF, 0xFF, 0xFF], &mut out).is_err());
    }
}
