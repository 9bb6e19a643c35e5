//! Streaming reader for single-file stores
//!
//! Scans the delimited file incrementally: characters are pulled one at a
//! time from a `CharDecoder`, appended to a buffer, and whenever the buffer
//! ends with the separator the preceding text is decoded as one record.
//! Memory is bounded by one record's token plus the separator plus one
//! decoded chunk, independent of the file size.
//!
//! The stream is single pass. A new traversal must open a new stream. The
//! underlying read handle is released as soon as the stream finishes,
//! fails, or is dropped.
//!
//! A separator occurring inside a token splits that token. Converters are
//! responsible for never emitting the separator.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::errors::{StoreError, StoreResult};
use crate::convert::{CollectionConverter, RecordConverter};
use crate::fs::{ByteSource, CharDecoder, Encoding, FileSource, FsError};

/// Lazily decoded records of a delimited file.
pub struct RecordStream<'c, T, C, S = FileSource> {
    /// `None` once the traversal has ended
    decoder: Option<CharDecoder<S>>,
    converter: &'c C,
    separator: &'c str,
    buffer: String,
    /// Index of the next token, for error locations
    index: usize,
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<'c, T, C> RecordStream<'c, T, C, FileSource>
where
    C: RecordConverter<T>,
{
    /// Opens a stream over the file at `path`.
    pub fn open(
        path: &Path,
        encoding: Encoding,
        chunk_size: usize,
        converter: &'c CollectionConverter<C>,
    ) -> StoreResult<Self> {
        let source = FileSource::open(path)?;
        let decoder = CharDecoder::with_chunk_size(source, encoding, chunk_size);
        Ok(Self::new(decoder, converter, path))
    }
}

impl<'c, T, C, S> RecordStream<'c, T, C, S>
where
    C: RecordConverter<T>,
    S: ByteSource,
{
    /// Creates a stream over an already-configured decoder. `path` is used
    /// only in error reports.
    pub fn new(
        decoder: CharDecoder<S>,
        converter: &'c CollectionConverter<C>,
        path: impl AsRef<Path>,
    ) -> Self {
        Self {
            decoder: Some(decoder),
            converter: converter.converter(),
            separator: converter.separator(),
            buffer: String::new(),
            index: 0,
            path: path.as_ref().to_path_buf(),
            _record: PhantomData,
        }
    }

    /// Whether the traversal has ended and the read handle was released.
    pub fn is_finished(&self) -> bool {
        self.decoder.is_none()
    }

    /// Reads characters up to the next separator or end of input.
    fn next_token(&mut self) -> StoreResult<Option<String>> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(None);
        };

        loop {
            match decoder.next_char() {
                Ok(Some(c)) => {
                    self.buffer.push(c);
                    if self.buffer.ends_with(self.separator) {
                        let token_len = self.buffer.len() - self.separator.len();
                        self.buffer.truncate(token_len);
                        if self.buffer.is_empty() {
                            continue;
                        }
                        return Ok(Some(std::mem::take(&mut self.buffer)));
                    }
                }
                Ok(None) => {
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(std::mem::take(&mut self.buffer)));
                }
                Err(e) => {
                    return Err(StoreError::Io(FsError::new("stream", &self.path, e)));
                }
            }
        }
    }

    fn finish(&mut self) {
        self.decoder = None;
        self.buffer = String::new();
    }
}

impl<'c, T, C, S> Iterator for RecordStream<'c, T, C, S>
where
    C: RecordConverter<T>,
    S: ByteSource,
{
    type Item = StoreResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(Some(token)) => {
                let index = self.index;
                self.index += 1;
                trace!(store = %self.path.display(), index, "decoding streamed token");

                let decoded = self.converter.from_token(&token).map_err(|e| {
                    StoreError::decode(format!("{}#{}", self.path.display(), index), e)
                });
                if decoded.is_err() {
                    self.finish();
                }
                Some(decoded)
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}
