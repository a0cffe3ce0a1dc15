//! Session file streaming
//!
//! A downloaded session file is a single-use byte stream in the sealed wire
//! format. The pipeline applies, lazily and in order: decrypt, inflate,
//! UTF-8 decode, JSON parse. Nothing is buffered beyond what each stage
//! needs unless the caller asks for a materialised form (`text`, `json`).

pub mod json_stream;
pub mod pipeline;
pub mod session_file;

pub use pipeline::{processed_stream, text_stream, ByteStream};
pub use session_file::SessionFile;
