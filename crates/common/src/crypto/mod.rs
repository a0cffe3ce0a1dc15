//! Cryptographic primitives for the sealed session-file format.
//!
//! Session files arrive sealed: an RSA-wrapped symmetric data key, an IV,
//! then the AES-256-CBC ciphertext of the payload. [`sealed`] implements
//! both directions: the streaming decryptor the download pipeline is built
//! on, and the `seal` counterpart used by the write path and round-trip
//! tests.

pub mod sealed;

pub use sealed::{
    header_len, open_header, seal, unseal, SealedHeader, SealedStreamDecryptor, DATA_KEY_LEN,
    IV_LEN,
};
