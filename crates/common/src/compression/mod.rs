//! Compression codecs for session file payloads
//!
//! Payloads are optionally compressed before sealing, so the download
//! pipeline inflates them after decryption. Two shapes are provided:
//! one-shot buffer codecs (gzip via flate2, brotli via the brotli crate)
//! and [`Inflater`], an incremental decompressor the streaming pipeline
//! feeds chunk by chunk.

use std::io::Write;

use brotli::{BrotliDecompressStream, BrotliResult, BrotliState};
use flate2::write::{GzDecoder, GzEncoder};
use flate2::Compression;

use crate::error::{CommonError, CommonResult};

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: i32 = 5;
const BROTLI_LG_WINDOW: i32 = 22;

/// Compress a buffer with gzip at the given level (clamped to 9).
pub fn gzip_compress(data: &[u8], level: u32) -> CommonResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder
        .write_all(data)
        .map_err(|e| CommonError::compression(format!("gzip compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| CommonError::compression(format!("gzip finalization failed: {e}")))
}

/// Decompress a gzip buffer.
pub fn gzip_decompress(data: &[u8]) -> CommonResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(Vec::new());
    decoder
        .write_all(data)
        .map_err(|e| CommonError::compression(format!("gzip decompression failed: {e}")))?;
    decoder
        .finish()
        .map_err(|e| CommonError::compression(format!("gzip stream incomplete: {e}")))
}

/// Compress a buffer with brotli.
pub fn brotli_compress(data: &[u8]) -> CommonResult<Vec<u8>> {
    let mut out = Vec::new();
    let params = brotli::enc::BrotliEncoderParams {
        quality: BROTLI_QUALITY,
        lgwin: BROTLI_LG_WINDOW,
        ..Default::default()
    };
    brotli::BrotliCompress(&mut &data[..], &mut out, &params)
        .map_err(|e| CommonError::compression(format!("brotli compression failed: {e}")))?;
    Ok(out)
}

/// Decompress a brotli buffer.
pub fn brotli_decompress(data: &[u8]) -> CommonResult<Vec<u8>> {
    let mut out = Vec::new();
    brotli::BrotliDecompress(&mut &data[..], &mut out)
        .map_err(|e| CommonError::compression(format!("brotli decompression failed: {e}")))?;
    Ok(out)
}

/// Incremental decompressor driven by the streaming pipeline.
///
/// The passthrough variant exists so the pipeline can treat "no
/// compression" uniformly: every stage is an `update`/`finalize` pair.
pub enum Inflater {
    Passthrough,
    Gzip(GzDecoder<Vec<u8>>),
    Brotli(Box<BrotliInflater>),
}

impl std::fmt::Debug for Inflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Passthrough => "Passthrough",
            Self::Gzip(_) => "Gzip",
            Self::Brotli(_) => "Brotli",
        };
        f.debug_tuple("Inflater").field(&name).finish()
    }
}

impl Inflater {
    /// An inflater that hands chunks through untouched.
    #[must_use]
    pub fn passthrough() -> Self {
        Self::Passthrough
    }

    /// A streaming gzip inflater.
    #[must_use]
    pub fn gzip() -> Self {
        Self::Gzip(GzDecoder::new(Vec::new()))
    }

    /// A streaming brotli inflater.
    #[must_use]
    pub fn brotli() -> Self {
        Self::Brotli(Box::new(BrotliInflater::new()))
    }

    /// Feed a compressed chunk, returning whatever plaintext it unlocked.
    ///
    /// # Errors
    ///
    /// Fails when the chunk is not valid for the selected coding.
    pub fn update(&mut self, chunk: &[u8]) -> CommonResult<Vec<u8>> {
        match self {
            Self::Passthrough => Ok(chunk.to_vec()),
            Self::Gzip(decoder) => {
                decoder
                    .write_all(chunk)
                    .map_err(|e| CommonError::compression(format!("gzip inflate failed: {e}")))?;
                Ok(std::mem::take(decoder.get_mut()))
            }
            Self::Brotli(state) => state.update(chunk),
        }
    }

    /// Flush the decoder and return any remaining plaintext.
    ///
    /// # Errors
    ///
    /// Fails when the compressed stream was truncated.
    pub fn finalize(self) -> CommonResult<Vec<u8>> {
        match self {
            Self::Passthrough => Ok(Vec::new()),
            Self::Gzip(decoder) => decoder
                .finish()
                .map_err(|e| CommonError::compression(format!("gzip stream incomplete: {e}"))),
            Self::Brotli(state) => state.finalize(),
        }
    }
}

/// Streaming brotli state driven through the low-level decompress calls.
pub struct BrotliInflater {
    state: BrotliState<brotli::enc::StandardAlloc, brotli::enc::StandardAlloc, brotli::enc::StandardAlloc>,
    total_out: usize,
    done: bool,
}

impl BrotliInflater {
    fn new() -> Self {
        Self {
            state: BrotliState::new(
                brotli::enc::StandardAlloc::default(),
                brotli::enc::StandardAlloc::default(),
                brotli::enc::StandardAlloc::default(),
            ),
            total_out: 0,
            done: false,
        }
    }

    fn update(&mut self, chunk: &[u8]) -> CommonResult<Vec<u8>> {
        if self.done {
            // Trailing bytes after the brotli stream closed.
            if chunk.is_empty() {
                return Ok(Vec::new());
            }
            return Err(CommonError::compression("brotli stream has trailing data"));
        }

        let mut collected = Vec::new();
        let mut available_in = chunk.len();
        let mut input_offset = 0usize;

        loop {
            let mut buf = [0u8; BROTLI_BUFFER_SIZE];
            let mut available_out = buf.len();
            let mut output_offset = 0usize;

            let result = BrotliDecompressStream(
                &mut available_in,
                &mut input_offset,
                chunk,
                &mut available_out,
                &mut output_offset,
                &mut buf,
                &mut self.total_out,
                &mut self.state,
            );
            collected.extend_from_slice(&buf[..output_offset]);

            match result {
                BrotliResult::ResultFailure => {
                    return Err(CommonError::compression("brotli inflate failed"));
                }
                BrotliResult::NeedsMoreOutput => {}
                BrotliResult::ResultSuccess => {
                    self.done = true;
                    return Ok(collected);
                }
                BrotliResult::NeedsMoreInput => return Ok(collected),
            }
        }
    }

    fn finalize(self) -> CommonResult<Vec<u8>> {
        if self.done {
            Ok(Vec::new())
        } else {
            Err(CommonError::compression("brotli stream incomplete"))
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for compression.
    use super::*;

    fn sample() -> Vec<u8> {
        b"Streamed session files compress well when their payload repeats. ".repeat(32)
    }

    /// Validates `gzip_compress`/`gzip_decompress` behavior for the round
    /// trip scenario.
    ///
    /// Assertions:
    /// - Confirms `decompressed` equals `original`.
    /// - Ensures `compressed.len() < original.len()` evaluates to true.
    #[test]
    fn gzip_round_trip() {
        let original = sample();

        let compressed = gzip_compress(&original, 6).unwrap();
        let decompressed = gzip_decompress(&compressed).unwrap();

        assert_eq!(decompressed, original);
        assert!(compressed.len() < original.len());
    }

    /// Validates `brotli_compress`/`brotli_decompress` behavior for the
    /// round trip scenario.
    ///
    /// Assertions:
    /// - Confirms `decompressed` equals `original`.
    /// - Ensures `compressed.len() < original.len()` evaluates to true.
    #[test]
    fn brotli_round_trip() {
        let original = sample();

        let compressed = brotli_compress(&original).unwrap();
        let decompressed = brotli_decompress(&compressed).unwrap();

        assert_eq!(decompressed, original);
        assert!(compressed.len() < original.len());
    }

    /// Validates `gzip_compress` behavior for the level clamping scenario.
    ///
    /// Assertions:
    /// - Confirms a level above 9 still round-trips.
    #[test]
    fn gzip_level_clamping() {
        let original = b"clamp me";
        let compressed = gzip_compress(original, 15).unwrap();
        assert_eq!(gzip_decompress(&compressed).unwrap(), original);
    }

    /// Validates `Inflater::gzip` behavior for the chunked inflate scenario.
    ///
    /// Assertions:
    /// - Confirms feeding 7-byte chunks reproduces the original bytes.
    #[test]
    fn streaming_gzip_inflate() {
        let original = sample();
        let compressed = gzip_compress(&original, 6).unwrap();

        let mut inflater = Inflater::gzip();
        let mut out = Vec::new();
        for chunk in compressed.chunks(7) {
            out.extend(inflater.update(chunk).unwrap());
        }
        out.extend(inflater.finalize().unwrap());

        assert_eq!(out, original);
    }

    /// Validates `Inflater::brotli` behavior for the chunked inflate
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms feeding 7-byte chunks reproduces the original bytes.
    #[test]
    fn streaming_brotli_inflate() {
        let original = sample();
        let compressed = brotli_compress(&original).unwrap();

        let mut inflater = Inflater::brotli();
        let mut out = Vec::new();
        for chunk in compressed.chunks(7) {
            out.extend(inflater.update(chunk).unwrap());
        }
        out.extend(inflater.finalize().unwrap());

        assert_eq!(out, original);
    }

    /// Validates `Inflater::passthrough` behavior for the uncompressed
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms chunks pass through unchanged and finalize adds nothing.
    #[test]
    fn passthrough_is_identity() {
        let mut inflater = Inflater::passthrough();

        let out = inflater.update(b"as-is").unwrap();
        assert_eq!(out, b"as-is");
        assert!(inflater.finalize().unwrap().is_empty());
    }

    /// Validates `Inflater::finalize` behavior for the truncated input
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures a gzip stream cut short fails at finalize.
    /// - Ensures a brotli stream cut short fails at finalize.
    #[test]
    fn truncated_streams_fail_finalize() {
        let compressed = gzip_compress(&sample(), 6).unwrap();
        let mut gz = Inflater::gzip();
        gz.update(&compressed[..compressed.len() / 2]).unwrap();
        assert!(matches!(gz.finalize(), Err(CommonError::Compression(_))));

        let compressed = brotli_compress(&sample()).unwrap();
        let mut br = Inflater::brotli();
        br.update(&compressed[..compressed.len() / 2]).unwrap();
        assert!(matches!(br.finalize(), Err(CommonError::Compression(_))));
    }

    /// Validates `Inflater::update` behavior for the corrupt gzip input
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures bytes that are not a gzip stream error out.
    #[test]
    fn corrupt_gzip_input_errors() {
        let mut inflater = Inflater::gzip();
        let mut failed = inflater.update(b"definitely not gzip data").is_err();
        failed |= inflater.finalize().is_err();
        assert!(failed);
    }
}
