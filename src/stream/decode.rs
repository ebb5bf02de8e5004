//! Text encodings and an incremental decoder that tolerates characters split
//! across chunk boundaries.

use crate::error::StreamError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Text encodings understood by the splitter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl Encoding {
    /// True when every byte below 0x80 encodes the ASCII character of the same
    /// value and never occurs inside a multi-byte sequence.
    #[must_use]
    pub fn is_ascii_compatible(self) -> bool {
        matches!(self, Self::Utf8 | Self::Latin1)
    }

    pub(crate) fn decoder(self) -> Decoder {
        Decoder {
            encoding: self,
            pending: Vec::new(),
        }
    }

    /// Decode a complete byte sequence, replacing malformed input with U+FFFD.
    #[must_use]
    pub fn decode_lossy(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Utf16Le | Self::Utf16Be => {
                let mut decoder = self.decoder();
                let mut text = decoder.write(bytes);
                text.push_str(&decoder.finish());
                text
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Utf8 => "utf8",
            Self::Utf16Le => "utf16le",
            Self::Utf16Be => "utf16be",
            Self::Latin1 => "latin1",
        })
    }
}

impl FromStr for Encoding {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Self::Utf16Le),
            "utf16be" | "utf-16be" => Ok(Self::Utf16Be),
            "latin1" | "iso-8859-1" | "binary" => Ok(Self::Latin1),
            other => Err(StreamError::Decode(format!("unknown encoding: {other}"))),
        }
    }
}

/// Incremental decoder. Bytes of an incomplete trailing character are held
/// back until the next `write` or until `finish`.
pub(crate) struct Decoder {
    encoding: Encoding,
    pending: Vec<u8>,
}

impl Decoder {
    pub(crate) fn write(&mut self, bytes: &[u8]) -> String {
        match self.encoding {
            Encoding::Latin1 => Encoding::Latin1.decode_lossy(bytes),
            Encoding::Utf8 => {
                self.pending.extend_from_slice(bytes);
                self.drain_utf8()
            }
            Encoding::Utf16Le | Encoding::Utf16Be => {
                self.pending.extend_from_slice(bytes);
                self.drain_utf16(false)
            }
        }
    }

    /// Flush held-back bytes; an incomplete character becomes U+FFFD.
    pub(crate) fn finish(&mut self) -> String {
        match self.encoding {
            Encoding::Latin1 => String::new(),
            Encoding::Utf8 => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                text
            }
            Encoding::Utf16Le | Encoding::Utf16Be => self.drain_utf16(true),
        }
    }

    fn drain_utf8(&mut self) -> String {
        let mut text = String::with_capacity(self.pending.len());
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    text.push_str(valid);
                    start = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[start..start + valid]));
                    match err.error_len() {
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            start += valid + bad;
                        }
                        None => {
                            start += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
        text
    }

    fn drain_utf16(&mut self, last: bool) -> String {
        let mut end = self.pending.len() - self.pending.len() % 2;
        if !last && end >= 2 {
            let unit = self.unit(end - 2);
            if (0xD800..0xDC00).contains(&unit) {
                end -= 2;
            }
        }
        let units: Vec<u16> = (0..end).step_by(2).map(|i| self.unit(i)).collect();
        let mut text: String = char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        self.pending.drain(..end);
        if last && !self.pending.is_empty() {
            text.push(char::REPLACEMENT_CHARACTER);
            self.pending.clear();
        }
        text
    }

    fn unit(&self, at: usize) -> u16 {
        let pair = [self.pending[at], self.pending[at + 1]];
        match self.encoding {
            Encoding::Utf16Be => u16::from_be_bytes(pair),
            _ => u16::from_le_bytes(pair),
        }
    }
}
