//! Chunked character decoder
//!
//! Produces decoded characters one at a time from a `ByteSource`, pulling a
//! new fixed-size byte chunk only when the previous one is used up. A
//! character whose bytes straddle two chunks is carried over and completed
//! by the next read, so memory stays bounded by the chunk size regardless
//! of the input length.

use std::io;

use super::encoding::{invalid_data, Encoding};
use super::source::ByteSource;

/// Default number of bytes fetched per read (16 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Smallest chunk that always fits one complete character
pub const MIN_CHUNK_SIZE: usize = 4;

pub struct CharDecoder<S> {
    source: S,
    encoding: Encoding,
    chunk_size: usize,
    /// Bytes read but not yet decoded (an incomplete trailing sequence)
    pending: Vec<u8>,
    /// Characters decoded from the current chunk
    decoded: String,
    /// Byte position of the next character in `decoded`
    cursor: usize,
    /// Source bytes fully decoded so far
    consumed: u64,
    exhausted: bool,
}

impl<S: ByteSource> CharDecoder<S> {
    /// Creates a decoder with the default chunk size.
    pub fn new(source: S, encoding: Encoding) -> Self {
        Self::with_chunk_size(source, encoding, DEFAULT_CHUNK_SIZE)
    }

    /// Creates a decoder reading `chunk_size` bytes at a time (at least
    /// `MIN_CHUNK_SIZE`).
    pub fn with_chunk_size(source: S, encoding: Encoding, chunk_size: usize) -> Self {
        Self {
            source,
            encoding,
            chunk_size: chunk_size.max(MIN_CHUNK_SIZE),
            pending: Vec::new(),
            decoded: String::new(),
            cursor: 0,
            consumed: 0,
            exhausted: false,
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of source bytes decoded into characters so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Returns the next character, or `None` at end of stream.
    pub fn next_char(&mut self) -> io::Result<Option<char>> {
        loop {
            if let Some(c) = self.decoded[self.cursor..].chars().next() {
                self.cursor += c.len_utf8();
                return Ok(Some(c));
            }

            if self.exhausted {
                return Ok(None);
            }

            self.refill()?;
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        self.decoded.clear();
        self.cursor = 0;

        let chunk = self.source.read_chunk(self.chunk_size)?;
        if chunk.is_empty() {
            self.exhausted = true;
        }
        self.pending.extend_from_slice(&chunk);

        match self
            .encoding
            .decode_prefix(&self.pending, &mut self.decoded, self.exhausted)
        {
            Ok(used) => {
                self.pending.drain(..used);
                self.consumed += used as u64;
                Ok(())
            }
            Err(offset) => {
                self.decoded.clear();
                Err(invalid_data(self.encoding, self.consumed + offset as u64))
            }
        }
    }

    /// Consumes the decoder, returning the underlying source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ByteSource> Iterator for CharDecoder<S> {
    type Item = io::Result<char>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_char().transpose()
    }
}
