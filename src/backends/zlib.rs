//! zlib backend adapter over `flate2`'s one-shot raw interfaces.
//!
//! A fresh `Compress`/`Decompress` state is built per split, mirroring the
//! stateless per-call contract: no dictionary or window survives between
//! splits, so every split stays independently decodable.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::BytepressError;

pub(crate) fn compress(
    clevel: u8,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, BytepressError> {
    let mut enc = Compress::new(Compression::new(clevel as u32), true);
    loop {
        let consumed = enc.total_in() as usize;
        let produced = enc.total_out() as usize;
        let status = enc
            .compress(&input[consumed..], &mut output[produced..], FlushCompress::Finish)
            .map_err(|e| BytepressError::Backend(format!("zlib: {}", e)))?;
        match status {
            Status::StreamEnd => return Ok(enc.total_out() as usize),
            Status::Ok if (enc.total_out() as usize) < output.len() => continue,
            // Out of output space before the stream ended: did not fit.
            Status::Ok | Status::BufError => return Ok(0),
        }
    }
}

pub(crate) fn decompress(input: &[u8], output: &mut [u8]) -> Result<usize, BytepressError> {
    let mut dec = Decompress::new(true);
    loop {
        let consumed = dec.total_in() as usize;
        let produced = dec.total_out() as usize;
        let status = dec
            .decompress(&input[consumed..], &mut output[produced..], FlushDecompress::Finish)
            .map_err(|e| BytepressError::Backend(format!("zlib: {}", e)))?;
        match status {
            Status::StreamEnd => return Ok(dec.total_out() as usize),
            Status::Ok if (dec.total_out() as usize) < output.len() => continue,
            Status::Ok | Status::BufError => {
                return Err(BytepressError::Backend(
                    "zlib: stream did not end within the expected output".into(),
                ))
            }
        }
    }
}
