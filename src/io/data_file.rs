//! Whole-file pipelines: read, decompress and parse; or compress and write.

use crate::io::compression::{compress, decompress, decompress_with, detect_codec, Compression};
use crate::io::parser::{parser, Format};
use crate::io::read::read;
use crate::stream::{as_bytes, map_transform, run, Sink, Source, Transform};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// How to interpret a data file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFileOptions {
    /// Explicit compression; detected from the location's extension when unset.
    pub compression: Option<Compression>,
    pub format: Format,
}

impl DataFileOptions {
    #[must_use]
    pub fn new(format: Format) -> Self {
        Self {
            compression: None,
            format,
        }
    }

    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }
}

fn decompressor(location: &str, compression: Option<Compression>) -> Result<Transform<Vec<u8>, Vec<u8>>> {
    let transform = match compression {
        Some(compression) => decompress(compression),
        None => match detect_codec(location) {
            Some(codec) => decompress_with(codec.as_ref()),
            None => decompress(Compression::detect(location)),
        },
    };
    transform.with_context(|| format!("setup decompression for {location}"))
}

/// Read, decompress and parse `location` into a lazy stream of records.
///
/// # Errors
/// When the location cannot be opened or the codec is unavailable. Decode
/// and parse failures arrive as stream errors.
///
/// # Panics
/// Lz4 decompression spawns a process, which needs a tokio runtime.
pub async fn read_data_file(location: &str, options: &DataFileOptions) -> Result<Source<Value>> {
    let (source, size) = read(location).await?;
    debug!(location, size, format = %options.format, "read data file");
    let decompressor = decompressor(location, options.compression)?;
    Ok(source.merge(decompressor).merge(parser(options.format)))
}

/// [`read_data_file`], deserializing every record into `T`.
///
/// # Errors
/// See [`read_data_file`]. A record that does not fit `T` ends the stream
/// with an item callback error carrying its index.
pub async fn read_data_file_as<T>(location: &str, options: &DataFileOptions) -> Result<Source<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let records = read_data_file(location, options).await?;
    Ok(records.merge(map_transform(serde_json::from_value::<T>)))
}

/// Write every chunk of `source` to `path`, compressed as requested or as the
/// extension suggests. Parent directories are created as needed.
///
/// # Errors
/// When the file cannot be created or any chunk fails to arrive or write.
pub async fn write_file<C>(path: impl AsRef<Path>, source: Source<C>, compression: Option<Compression>) -> Result<()>
where
    C: AsRef<[u8]> + Send + 'static,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("create {}", path.display()))?;
    let compression = compression.unwrap_or_else(|| Compression::detect(path));
    let encoder = compress(compression, None)
        .with_context(|| format!("setup compression for {}", path.display()))?;
    debug!(path = %path.display(), %compression, "write file");
    run(source.merge(as_bytes()).merge(encoder), Sink::from_writer(file))
        .await
        .with_context(|| format!("write {}", path.display()))
}
