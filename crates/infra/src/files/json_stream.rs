//! Lazy JSON array streaming
//!
//! Parses a streamed JSON array into a single-pass sequence of element
//! values without materialising the whole document. The splitter is a byte
//! state machine tracking string/escape state and bracket depth; element
//! boundaries are top-level commas and the closing bracket.

use std::collections::VecDeque;

use futures::stream::{self, BoxStream, StreamExt};
use vaultlink_domain::{Result, VaultError};

use crate::files::pipeline::ByteStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    BeforeArray,
    InArray,
    Done,
}

/// Incremental splitter yielding raw element buffers from a JSON array.
#[derive(Debug)]
pub(crate) struct ArraySplitter {
    phase: Phase,
    depth: u32,
    in_string: bool,
    escaped: bool,
    current: Vec<u8>,
}

impl ArraySplitter {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::BeforeArray,
            depth: 0,
            in_string: false,
            escaped: false,
            current: Vec::new(),
        }
    }

    /// Feed a chunk, returning every element completed by it.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut complete = Vec::new();
        for &byte in chunk {
            if let Some(element) = self.push(byte)? {
                complete.push(element);
            }
        }
        Ok(complete)
    }

    /// The stream ended; verify the array was closed.
    pub(crate) fn finish(&self) -> Result<()> {
        if self.phase == Phase::Done {
            Ok(())
        } else {
            Err(VaultError::Validation("unterminated JSON array".to_string()))
        }
    }

    fn push(&mut self, byte: u8) -> Result<Option<Vec<u8>>> {
        match self.phase {
            Phase::BeforeArray => {
                if byte.is_ascii_whitespace() {
                    return Ok(None);
                }
                if byte == b'[' {
                    self.phase = Phase::InArray;
                    return Ok(None);
                }
                Err(VaultError::Validation("stream is not a JSON array".to_string()))
            }
            Phase::InArray => self.push_in_array(byte),
            Phase::Done => {
                if byte.is_ascii_whitespace() {
                    Ok(None)
                } else {
                    Err(VaultError::Validation(
                        "trailing data after JSON array".to_string(),
                    ))
                }
            }
        }
    }

    fn push_in_array(&mut self, byte: u8) -> Result<Option<Vec<u8>>> {
        if self.in_string {
            self.current.push(byte);
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return Ok(None);
        }

        if self.depth == 0 {
            match byte {
                b',' => return self.take_element().map(Some),
                b']' => {
                    self.phase = Phase::Done;
                    if self.has_element() {
                        return self.take_element().map(Some);
                    }
                    return Ok(None);
                }
                _ if byte.is_ascii_whitespace() && self.current.is_empty() => return Ok(None),
                _ => {}
            }
        }

        match byte {
            b'"' => self.in_string = true,
            b'{' | b'[' => self.depth += 1,
            b'}' | b']' => {
                self.depth = self.depth.checked_sub(1).ok_or_else(|| {
                    VaultError::Validation("unbalanced brackets in JSON array".to_string())
                })?;
            }
            _ => {}
        }
        self.current.push(byte);
        Ok(None)
    }

    fn has_element(&self) -> bool {
        self.current.iter().any(|b| !b.is_ascii_whitespace())
    }

    fn take_element(&mut self) -> Result<Vec<u8>> {
        if !self.has_element() {
            return Err(VaultError::Validation("empty JSON array element".to_string()));
        }
        let mut element = std::mem::take(&mut self.current);
        while element.last().is_some_and(u8::is_ascii_whitespace) {
            element.pop();
        }
        Ok(element)
    }
}

struct JsonState {
    inner: ByteStream,
    splitter: ArraySplitter,
    queue: VecDeque<Vec<u8>>,
    ended: bool,
}

/// Stream the elements of a JSON array lazily.
///
/// Single-pass: the underlying byte stream is consumed as elements are
/// pulled, and the sequence is not restartable.
pub fn json_array_stream(bytes: ByteStream) -> BoxStream<'static, Result<serde_json::Value>> {
    let state = JsonState {
        inner: bytes.fuse().boxed(),
        splitter: ArraySplitter::new(),
        queue: VecDeque::new(),
        ended: false,
    };

    stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(raw) = state.queue.pop_front() {
                let value: serde_json::Value = serde_json::from_slice(&raw)?;
                return Ok(Some((value, state)));
            }
            if state.ended {
                return Ok(None);
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    state.queue.extend(state.splitter.feed(&chunk)?);
                }
                Some(Err(err)) => return Err(err),
                None => {
                    state.splitter.finish()?;
                    state.ended = true;
                }
            }
        }
    })
    .boxed()
}
