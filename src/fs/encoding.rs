//! Character encodings supported by the text primitives

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Character encoding of a store's text files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "utf-16le")]
    Utf16Le,
    #[serde(rename = "utf-16be")]
    Utf16Be,
}

/// Returned when an encoding name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown encoding: {0}")]
pub struct UnknownEncoding(pub String);

impl Encoding {
    /// Canonical name, as used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
        }
    }

    /// Encodes `text` into bytes.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Encoding::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }

    /// Decodes a complete byte buffer.
    pub fn decode(&self, bytes: &[u8]) -> io::Result<String> {
        let mut out = String::with_capacity(bytes.len());
        self.decode_prefix(bytes, &mut out, true)
            .map_err(|offset| invalid_data(*self, offset as u64))?;
        Ok(out)
    }

    /// Decodes as many complete characters from `bytes` as possible,
    /// appending them to `out`.
    ///
    /// Returns the number of bytes consumed. When `at_eof` is false, an
    /// incomplete sequence at the end of `bytes` is left unconsumed so the
    /// caller can retry once more bytes arrive. On malformed input returns
    /// `Err(offset)` with the offset of the offending byte within `bytes`.
    pub(crate) fn decode_prefix(
        &self,
        bytes: &[u8],
        out: &mut String,
        at_eof: bool,
    ) -> Result<usize, usize> {
        match self {
            Encoding::Utf8 => decode_utf8_prefix(bytes, out, at_eof),
            Encoding::Utf16Le => decode_utf16_prefix(bytes, out, at_eof, u16::from_le_bytes),
            Encoding::Utf16Be => decode_utf16_prefix(bytes, out, at_eof, u16::from_be_bytes),
        }
    }
}

pub(crate) fn invalid_data(encoding: Encoding, offset: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("invalid {} sequence at byte offset {}", encoding, offset),
    )
}

fn decode_utf8_prefix(bytes: &[u8], out: &mut String, at_eof: bool) -> Result<usize, usize> {
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            out.push_str(text);
            Ok(bytes.len())
        }
        Err(e) => {
            let valid = e.valid_up_to();
            // the prefix up to `valid_up_to` is always valid UTF-8
            out.push_str(std::str::from_utf8(&bytes[..valid]).unwrap_or_default());
            match e.error_len() {
                // Incomplete trailing sequence; wait for the next chunk
                None if !at_eof => Ok(valid),
                _ => Err(valid),
            }
        }
    }
}

fn decode_utf16_prefix(
    bytes: &[u8],
    out: &mut String,
    at_eof: bool,
    unit: fn([u8; 2]) -> u16,
) -> Result<usize, usize> {
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    let mut usable = units.len() * 2;

    // A high surrogate at the end may be completed by the next chunk
    if !at_eof {
        if let Some(&last) = units.last() {
            if (0xD800..0xDC00).contains(&last) {
                units.pop();
                usable -= 2;
            }
        }
    }

    let mut offset = 0;
    for decoded in char::decode_utf16(units.iter().copied()) {
        match decoded {
            Ok(c) => {
                out.push(c);
                offset += c.len_utf16() * 2;
            }
            Err(_) => return Err(offset),
        }
    }

    if at_eof && bytes.len() % 2 != 0 {
        return Err(usable);
    }

    Ok(usable)
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "utf-16le" | "utf16le" => Ok(Encoding::Utf16Le),
            "utf-16be" | "utf16be" => Ok(Encoding::Utf16Be),
            _ => Err(UnknownEncoding(s.to_string())),
        }
    }
}
