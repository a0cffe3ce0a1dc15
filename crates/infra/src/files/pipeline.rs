//! Streaming decrypt/inflate/decode transforms
//!
//! Each transform consumes the previous stage's stream and yields its own,
//! chunk by chunk. The decrypt stage buffers only the sealed header before
//! switching to incremental block decryption; the inflate stage drains the
//! decompressor as plaintext becomes available.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use futures::TryStreamExt;
use rsa::RsaPrivateKey;
use vaultlink_common::compression::Inflater;
use vaultlink_common::crypto::{header_len, open_header, SealedStreamDecryptor};
use vaultlink_domain::{CompressionKind, Result, VaultError};

use crate::errors::from_common;

/// A single-use stream of byte chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

enum DecryptStage {
    /// Accumulating the sealed header (wrapped key + IV).
    Buffering(Vec<u8>),
    /// Header opened; decrypting body blocks as they arrive.
    Streaming(SealedStreamDecryptor),
    Finished,
}

struct PipelineState {
    inner: ByteStream,
    stage: DecryptStage,
    inflater: Option<Inflater>,
    private_key: Arc<RsaPrivateKey>,
}

impl PipelineState {
    fn absorb(&mut self, chunk: &[u8]) -> Result<Vec<u8>> {
        match &mut self.stage {
            DecryptStage::Buffering(buffer) => {
                buffer.extend_from_slice(chunk);
                let header_len = header_len(&self.private_key);
                if buffer.len() < header_len {
                    return Ok(Vec::new());
                }

                let header =
                    open_header(&buffer[..header_len], &self.private_key).map_err(from_common)?;
                let mut decryptor = header.decryptor();
                let plaintext = decryptor.update(&buffer[header_len..]);
                self.stage = DecryptStage::Streaming(decryptor);
                self.inflate(&plaintext)
            }
            DecryptStage::Streaming(decryptor) => {
                let plaintext = decryptor.update(chunk);
                self.inflate(&plaintext)
            }
            DecryptStage::Finished => Ok(Vec::new()),
        }
    }

    fn inflate(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }
        self.inflater_mut()?.update(plaintext).map_err(from_common)
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        match std::mem::replace(&mut self.stage, DecryptStage::Finished) {
            DecryptStage::Buffering(_) => Err(VaultError::Crypto(
                "sealed stream ended before the header was complete".to_string(),
            )),
            DecryptStage::Streaming(decryptor) => {
                let tail = decryptor.finalize().map_err(from_common)?;
                let mut inflater = self.take_inflater()?;
                let mut out = inflater.update(&tail).map_err(from_common)?;
                out.extend(inflater.finalize().map_err(from_common)?);
                Ok(out)
            }
            DecryptStage::Finished => Ok(Vec::new()),
        }
    }

    fn inflater_mut(&mut self) -> Result<&mut Inflater> {
        self.inflater
            .as_mut()
            .ok_or_else(|| VaultError::Internal("pipeline inflater already consumed".to_string()))
    }

    fn take_inflater(&mut self) -> Result<Inflater> {
        self.inflater
            .take()
            .ok_or_else(|| VaultError::Internal("pipeline inflater already consumed".to_string()))
    }
}

/// Decrypt and conditionally inflate a sealed byte stream.
///
/// The resulting stream yields plaintext chunks lazily; errors from any
/// stage (transport, header unwrap, padding, inflate) end the stream with
/// that error.
pub fn processed_stream(
    raw: ByteStream,
    private_key: Arc<RsaPrivateKey>,
    compression: Option<CompressionKind>,
) -> ByteStream {
    let inflater = match compression {
        None => Inflater::passthrough(),
        Some(CompressionKind::Gzip) => Inflater::gzip(),
        Some(CompressionKind::Brotli) => Inflater::brotli(),
    };

    let state = PipelineState {
        inner: raw.fuse().boxed(),
        stage: DecryptStage::Buffering(Vec::new()),
        inflater: Some(inflater),
        private_key,
    };

    stream::try_unfold(state, |mut state| async move {
        loop {
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    let plaintext = state.absorb(&chunk)?;
                    if !plaintext.is_empty() {
                        return Ok(Some((Bytes::from(plaintext), state)));
                    }
                }
                Some(Err(err)) => return Err(err),
                None => {
                    let tail = state.finish()?;
                    if tail.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some((Bytes::from(tail), state)));
                }
            }
        }
    })
    .boxed()
}

struct TextState {
    inner: ByteStream,
    tail: Vec<u8>,
}

/// Decode a byte stream into UTF-8 text chunks.
///
/// Multi-byte sequences split across chunk boundaries are held back until
/// completed; genuinely invalid UTF-8 fails the stream with a validation
/// error.
pub fn text_stream(bytes: ByteStream) -> BoxStream<'static, Result<String>> {
    let state = TextState { inner: bytes.fuse().boxed(), tail: Vec::new() };

    stream::try_unfold(state, |mut state| async move {
        loop {
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    let mut data = std::mem::take(&mut state.tail);
                    data.extend_from_slice(&chunk);

                    match std::str::from_utf8(&data) {
                        Ok(text) => {
                            if text.is_empty() {
                                continue;
                            }
                            return Ok(Some((text.to_string(), state)));
                        }
                        Err(err) if err.error_len().is_none() => {
                            // Incomplete sequence at the end of the chunk.
                            let valid_up_to = err.valid_up_to();
                            let rest = data.split_off(valid_up_to);
                            state.tail = rest;
                            if valid_up_to == 0 {
                                continue;
                            }
                            let text = String::from_utf8(data).map_err(|_| {
                                VaultError::Internal("validated UTF-8 split failed".to_string())
                            })?;
                            return Ok(Some((text, state)));
                        }
                        Err(_) => {
                            return Err(VaultError::Validation(
                                "file content is not valid UTF-8".to_string(),
                            ));
                        }
                    }
                }
                Some(Err(err)) => return Err(err),
                None => {
                    if !state.tail.is_empty() {
                        return Err(VaultError::Validation(
                            "file content ends mid UTF-8 sequence".to_string(),
                        ));
                    }
                    return Ok(None);
                }
            }
        }
    })
    .boxed()
}

/// Wrap an HTTP response body as a [`ByteStream`].
pub fn response_stream(response: reqwest::Response) -> ByteStream {
    response.bytes_stream().map_err(|e| crate::errors::from_reqwest(&e)).boxed()
}

/// Wrap an in-memory buffer as a [`ByteStream`], split into `chunk_size`
/// pieces. Useful for tests and for callers holding already-downloaded
/// bytes.
pub fn bytes_stream(data: Vec<u8>, chunk_size: usize) -> ByteStream {
    let chunks: Vec<Result<Bytes>> = data
        .chunks(chunk_size.max(1))
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    stream::iter(chunks).boxed()
}
