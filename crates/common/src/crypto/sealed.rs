//! Sealed-file wire format
//!
//! Layout, in stream order:
//!
//! ```text
//! [ wrapped data key | RSA-OAEP(SHA-256), one modulus length ]
//! [ IV               | 16 bytes                              ]
//! [ ciphertext       | AES-256-CBC, PKCS#7 padded            ]
//! ```
//!
//! The wrapped-key block is exactly the private key's modulus size (256
//! bytes for the standard 2048-bit key), so the header length is derived
//! from the configured key rather than assumed.

use std::fmt;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{CommonError, CommonResult};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Length of the symmetric data key.
pub const DATA_KEY_LEN: usize = 32;
/// Length of the initialization vector.
pub const IV_LEN: usize = 16;

const BLOCK: usize = 16;

/// Header length for a given private key: wrapped-key block plus IV.
pub fn header_len(private_key: &RsaPrivateKey) -> usize {
    private_key.size() + IV_LEN
}

/// Decoded header of a sealed stream: the unwrapped data key and IV.
pub struct SealedHeader {
    data_key: [u8; DATA_KEY_LEN],
    iv: [u8; IV_LEN],
}

impl fmt::Debug for SealedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedHeader").field("data_key", &"[REDACTED]").field("iv", &self.iv).finish()
    }
}

impl SealedHeader {
    /// Start a streaming decryptor for the ciphertext that follows this
    /// header.
    #[must_use]
    pub fn decryptor(&self) -> SealedStreamDecryptor {
        SealedStreamDecryptor {
            cipher: Aes256CbcDec::new(&self.data_key.into(), &self.iv.into()),
            pending: Vec::with_capacity(2 * BLOCK),
        }
    }
}

/// Unwrap a sealed-stream header with the configured private key.
///
/// # Errors
///
/// Fails when the header is shorter than `header_len`, when the data key
/// does not unwrap under this private key, or when the unwrapped key has the
/// wrong length.
pub fn open_header(header: &[u8], private_key: &RsaPrivateKey) -> CommonResult<SealedHeader> {
    let key_block_len = private_key.size();
    if header.len() < key_block_len + IV_LEN {
        return Err(CommonError::crypto(format!(
            "sealed header truncated: got {} bytes, need {}",
            header.len(),
            key_block_len + IV_LEN
        )));
    }

    let unwrapped = private_key
        .decrypt(Oaep::new::<Sha256>(), &header[..key_block_len])
        .map_err(|e| CommonError::crypto(format!("data key unwrap failed: {e}")))?;

    let data_key: [u8; DATA_KEY_LEN] = unwrapped
        .as_slice()
        .try_into()
        .map_err(|_| CommonError::crypto("unwrapped data key has wrong length"))?;

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&header[key_block_len..key_block_len + IV_LEN]);

    Ok(SealedHeader { data_key, iv })
}

/// Incremental AES-256-CBC decryptor for the body of a sealed stream.
///
/// Feed ciphertext chunks through [`update`](Self::update) as they arrive;
/// the final block is held back until [`finalize`](Self::finalize) so the
/// PKCS#7 padding can be stripped once the stream ends.
pub struct SealedStreamDecryptor {
    cipher: Aes256CbcDec,
    pending: Vec<u8>,
}

impl fmt::Debug for SealedStreamDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedStreamDecryptor").field("pending", &self.pending.len()).finish()
    }
}

impl SealedStreamDecryptor {
    /// Decrypt every complete block that can no longer be the final one.
    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(input);

        let len = self.pending.len();
        let tail = len % BLOCK;
        // Hold back the partial tail plus one full block: until the stream
        // ends, any full block could be the padded final one.
        let held = if tail == 0 { BLOCK } else { tail + BLOCK };
        let processable = len.saturating_sub(held);
        if processable == 0 {
            return Vec::new();
        }

        let mut out: Vec<u8> = self.pending.drain(..processable).collect();
        for block in out.chunks_exact_mut(BLOCK) {
            self.cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        out
    }

    /// Decrypt the held-back final block and strip the padding.
    ///
    /// # Errors
    ///
    /// Fails when the total ciphertext was not block-aligned (truncated
    /// stream) or when the padding bytes are invalid.
    pub fn finalize(mut self) -> CommonResult<Vec<u8>> {
        if self.pending.len() != BLOCK {
            return Err(CommonError::crypto(format!(
                "sealed stream truncated: {} trailing bytes, expected a {BLOCK}-byte final block",
                self.pending.len()
            )));
        }

        let mut block = std::mem::take(&mut self.pending);
        self.cipher.decrypt_block_mut(GenericArray::from_mut_slice(&mut block));
        strip_pkcs7(block)
    }
}

fn strip_pkcs7(mut block: Vec<u8>) -> CommonResult<Vec<u8>> {
    let pad = *block.last().ok_or_else(|| CommonError::crypto("empty final block"))? as usize;
    if pad == 0 || pad > BLOCK {
        return Err(CommonError::crypto("invalid padding"));
    }
    if !block[block.len() - pad..].iter().all(|&b| b as usize == pad) {
        return Err(CommonError::crypto("invalid padding"));
    }
    block.truncate(block.len() - pad);
    Ok(block)
}

/// Seal a payload for the holder of `public_key`.
///
/// Generates a fresh data key and IV, wraps the key with RSA-OAEP(SHA-256),
/// and emits the documented wire layout.
///
/// # Errors
///
/// Fails when the RSA encryption of the data key fails (e.g. the key is too
/// small to wrap 32 bytes under OAEP).
pub fn seal(payload: &[u8], public_key: &RsaPublicKey) -> CommonResult<Vec<u8>> {
    let mut rng = rand::thread_rng();

    let mut data_key = [0u8; DATA_KEY_LEN];
    rng.fill_bytes(&mut data_key);
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let wrapped = public_key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), &data_key)
        .map_err(|e| CommonError::crypto(format!("data key wrap failed: {e}")))?;

    let ciphertext =
        Aes256CbcEnc::new(&data_key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(payload);

    let mut out = Vec::with_capacity(wrapped.len() + IV_LEN + ciphertext.len());
    out.extend_from_slice(&wrapped);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// One-shot convenience: open the header and decrypt the whole body.
///
/// # Errors
///
/// Propagates header and padding failures; also fails when the input is too
/// short to contain a header and at least one ciphertext block.
pub fn unseal(bytes: &[u8], private_key: &RsaPrivateKey) -> CommonResult<Vec<u8>> {
    let header_len = header_len(private_key);
    if bytes.len() < header_len + BLOCK {
        return Err(CommonError::crypto(format!(
            "sealed payload truncated: got {} bytes, need at least {}",
            bytes.len(),
            header_len + BLOCK
        )));
    }

    let header = open_header(&bytes[..header_len], private_key)?;
    let mut decryptor = header.decryptor();
    let mut out = decryptor.update(&bytes[header_len..]);
    out.extend(decryptor.finalize()?);
    Ok(out)
}

#[cfg(test)]
mod tests {
    //! Unit tests for crypto::sealed.
    use std::sync::OnceLock;

    use super::*;

    fn test_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| {
            RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("test key generation")
        })
    }

    /// Validates `seal`/`unseal` behavior for the round trip scenario.
    ///
    /// Assertions:
    /// - Confirms the unsealed bytes equal the original payload.
    #[test]
    fn seal_unseal_round_trip() {
        let private_key = test_key();
        let public_key = RsaPublicKey::from(private_key);

        let payload = b"the quick brown fox jumps over the lazy dog";
        let sealed = seal(payload, &public_key).unwrap();
        let opened = unseal(&sealed, private_key).unwrap();

        assert_eq!(opened, payload);
    }

    /// Validates `seal` behavior for the header layout scenario.
    ///
    /// Assertions:
    /// - Confirms the output length is header plus whole ciphertext blocks.
    #[test]
    fn sealed_layout_is_header_plus_blocks() {
        let private_key = test_key();
        let public_key = RsaPublicKey::from(private_key);

        let sealed = seal(b"abc", &public_key).unwrap();
        let body_len = sealed.len() - header_len(private_key);

        assert_eq!(private_key.size(), 256);
        assert_eq!(body_len % 16, 0);
        assert!(body_len >= 16);
    }

    /// Validates `SealedStreamDecryptor` behavior for the chunked feed
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms byte-at-a-time streaming produces the same plaintext as
    ///   the one-shot path.
    #[test]
    fn streaming_matches_one_shot_for_any_chunking() {
        let private_key = test_key();
        let public_key = RsaPublicKey::from(private_key);

        let payload: Vec<u8> = (0u16..1000).map(|i| (i % 251) as u8).collect();
        let sealed = seal(&payload, &public_key).unwrap();

        let header = open_header(&sealed[..header_len(private_key)], private_key).unwrap();
        let mut decryptor = header.decryptor();

        let mut out = Vec::new();
        for byte in &sealed[header_len(private_key)..] {
            out.extend(decryptor.update(std::slice::from_ref(byte)));
        }
        out.extend(decryptor.finalize().unwrap());

        assert_eq!(out, payload);
    }

    /// Validates `unseal` behavior for the empty payload scenario.
    ///
    /// Assertions:
    /// - Confirms an empty payload round-trips through a full padding block.
    #[test]
    fn empty_payload_round_trips() {
        let private_key = test_key();
        let public_key = RsaPublicKey::from(private_key);

        let sealed = seal(b"", &public_key).unwrap();
        assert_eq!(unseal(&sealed, private_key).unwrap(), b"");
    }

    /// Validates `open_header` behavior for the wrong key scenario.
    ///
    /// Assertions:
    /// - Ensures unwrapping with a different private key fails as a crypto
    ///   error.
    #[test]
    fn wrong_key_fails_unwrap() {
        let private_key = test_key();
        let public_key = RsaPublicKey::from(private_key);
        let other = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();

        let sealed = seal(b"secret", &public_key).unwrap();
        let result = open_header(&sealed[..header_len(&other)], &other);

        assert!(matches!(result, Err(CommonError::Crypto(_))));
    }

    /// Validates `SealedStreamDecryptor::finalize` behavior for the
    /// truncated stream scenario.
    ///
    /// Assertions:
    /// - Ensures a ciphertext cut mid-block fails instead of returning
    ///   partial plaintext.
    #[test]
    fn truncated_stream_fails_finalize() {
        let private_key = test_key();
        let public_key = RsaPublicKey::from(private_key);

        let sealed = seal(b"0123456789abcdef0123456789abcdef", &public_key).unwrap();
        let header = open_header(&sealed[..header_len(private_key)], private_key).unwrap();

        let mut decryptor = header.decryptor();
        let body = &sealed[header_len(private_key)..];
        decryptor.update(&body[..body.len() - 7]);

        assert!(matches!(decryptor.finalize(), Err(CommonError::Crypto(_))));
    }

    /// Validates `unseal` behavior for the corrupted padding scenario.
    ///
    /// Assertions:
    /// - Ensures flipping a byte in the final block fails padding checks.
    #[test]
    fn corrupted_final_block_fails_padding() {
        let private_key = test_key();
        let public_key = RsaPublicKey::from(private_key);

        let mut sealed = seal(b"payload bytes", &public_key).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;

        assert!(matches!(unseal(&sealed, private_key), Err(CommonError::Crypto(_))));
    }
}
