//! Sample datasets, chunking helpers and temporary files.

use crate::io::compression::{compress_bytes, Compression};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Row of the sample people dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplePerson {
    pub name: String,
    pub city: String,
    pub age: String,
}

/// Four people, as typed records.
#[must_use]
pub fn sample_people() -> Vec<SamplePerson> {
    [("ada", "london", "36"), ("bob", "paris", "41"), ("cy", "berlin", "29"), ("dee", "oslo", "52")]
        .into_iter()
        .map(|(name, city, age)| SamplePerson {
            name: name.into(),
            city: city.into(),
            age: age.into(),
        })
        .collect()
}

/// [`sample_people`] as CSV text with a header, separated by `separator`.
#[must_use]
pub fn sample_people_csv(separator: char) -> String {
    let mut text = format!("name{separator}city{separator}age\n");
    for p in sample_people() {
        text.push_str(&format!("{}{separator}{}{separator}{}\n", p.name, p.city, p.age));
    }
    text
}

/// [`sample_people`] as newline-delimited JSON.
#[must_use]
pub fn sample_people_ndjson() -> String {
    sample_people()
        .iter()
        .filter_map(|p| serde_json::to_string(p).ok())
        .map(|line| line + "\n")
        .collect()
}

/// Split `bytes` into chunks of at most `size` bytes (at least one byte each).
#[must_use]
pub fn chunked(bytes: &[u8], size: usize) -> Vec<Vec<u8>> {
    bytes.chunks(size.max(1)).map(<[u8]>::to_vec).collect()
}

/// Split `bytes` at the given cut points (out-of-range or unordered cuts are
/// ignored), so tests can place chunk boundaries exactly.
#[must_use]
pub fn split_at_cuts(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for &cut in cuts {
        if cut > start && cut < bytes.len() {
            chunks.push(bytes[start..cut].to_vec());
            start = cut;
        }
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

/// A temporary file that is deleted when dropped.
pub struct TempFilePath {
    _file: NamedTempFile,
    path: PathBuf,
}

impl TempFilePath {
    /// Create an empty temporary file whose name ends in `suffix` (e.g. `.csv.gz`).
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn with_suffix(suffix: &str) -> std::io::Result<Self> {
        let file = tempfile::Builder::new().suffix(suffix).tempfile()?;
        let path = file.path().to_path_buf();
        Ok(Self { _file: file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path as UTF-8, for APIs taking a location string.
    #[must_use]
    pub fn location(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Create a temporary file containing `contents`.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written.
pub fn mock_text_file(contents: impl AsRef<[u8]>, suffix: &str) -> std::io::Result<TempFilePath> {
    let temp = TempFilePath::with_suffix(suffix)?;
    let mut file = std::fs::File::create(temp.path())?;
    file.write_all(contents.as_ref())?;
    file.flush()?;
    Ok(temp)
}

/// Create a temporary file holding `contents` compressed with `compression`.
///
/// # Errors
///
/// Returns an error if the codec is unavailable (including lz4, which only
/// exists as an external tool) or the file cannot be written.
pub fn mock_compressed_file(
    contents: impl AsRef<[u8]>,
    compression: Compression,
    suffix: &str,
) -> std::io::Result<TempFilePath> {
    let packed = compress_bytes(compression, contents.as_ref(), None)?;
    mock_text_file(packed, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuts_place_boundaries() {
        let chunks = split_at_cuts(b"abcdef", &[2, 2, 10, 4]);
        assert_eq!(chunks, vec![b"ab".to_vec(), b"cd".to_vec(), b"ef".to_vec()]);
    }

    #[test]
    fn csv_fixture_has_header_and_rows() {
        let csv = sample_people_csv(';');
        assert!(csv.starts_with("name;city;age\n"));
        assert_eq!(csv.lines().count(), 5);
    }

    #[test]
    fn mock_file_round_trips_bytes() -> std::io::Result<()> {
        let temp = mock_text_file("hello", ".txt")?;
        assert_eq!(std::fs::read(temp.path())?, b"hello");
        assert!(temp.location().ends_with(".txt"));
        Ok(())
    }
}
