//! Compression and decompression as byte transforms.
//!
//! Gzip, zstd, bzip2 and xz run in-process through the write-side encoders and
//! decoders of `flate2`, `zstd`, `bzip2` and `xz2`: every input chunk is
//! written into the codec and whatever output it has produced so far is
//! emitted as one chunk. Lz4 is delegated to the external `lz4` executable
//! through [`spawn_transform`].
//!
//! ## Built-in codecs
//!
//! | codec | feature             | extensions      | default level |
//! |-------|---------------------|-----------------|---------------|
//! | gzip  | `compression-gzip`  | `.gz`, `.gzip`  | 5             |
//! | zstd  | `compression-zstd`  | `.zst`, `.zstd` | 3             |
//! | bzip2 | `compression-bzip2` | `.bz2`, `.bzip2`| 6             |
//! | xz    | `compression-xz`    | `.xz`           | 6             |
//! | lz4   | (needs `lz4` CLI)   | `.lz4`          | 1             |
//!
//! ## Custom codecs
//! ```
//! use ironstream::io::compression::{register_codec, ChunkCodec, CompressionCodec};
//! use std::io;
//! use std::sync::Arc;
//!
//! struct Identity;
//!
//! impl ChunkCodec for Identity {
//!     fn push(&mut self, input: &[u8]) -> io::Result<Vec<u8>> { Ok(input.to_vec()) }
//!     fn finish(self: Box<Self>) -> io::Result<Vec<u8>> { Ok(Vec::new()) }
//! }
//!
//! struct IdentityCodec;
//!
//! impl CompressionCodec for IdentityCodec {
//!     fn name(&self) -> &str { "identity" }
//!     fn extensions(&self) -> &[&str] { &[".id"] }
//!     fn magic_bytes(&self) -> Option<&[u8]> { None }
//!     fn decoder(&self) -> io::Result<Box<dyn ChunkCodec>> { Ok(Box::new(Identity)) }
//!     fn encoder(&self, _level: Option<u32>) -> io::Result<Box<dyn ChunkCodec>> { Ok(Box::new(Identity)) }
//! }
//!
//! register_codec(Arc::new(IdentityCodec));
//! ```

use crate::error::StreamError;
use crate::stream::{pass_through, spawn_transform, Operator, Transform};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Compression formats understood by [`decompress`] and [`compress`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Gzip,
    Zstd,
    Bzip2,
    Xz,
    Lz4,
    #[default]
    None,
}

impl Compression {
    const DETECTABLE: [Self; 5] = [Self::Gzip, Self::Zstd, Self::Bzip2, Self::Xz, Self::Lz4];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Lz4 => "lz4",
            Self::None => "none",
        }
    }

    /// Lowercase file extensions, leading dot included.
    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Gzip => &[".gz", ".gzip"],
            Self::Zstd => &[".zst", ".zstd"],
            Self::Bzip2 => &[".bz2", ".bzip2"],
            Self::Xz => &[".xz"],
            Self::Lz4 => &[".lz4"],
            Self::None => &[],
        }
    }

    #[must_use]
    pub fn magic_bytes(self) -> Option<&'static [u8]> {
        match self {
            Self::Gzip => Some(&[0x1f, 0x8b]),
            Self::Zstd => Some(&[0x28, 0xb5, 0x2f, 0xfd]),
            Self::Bzip2 => Some(b"BZh"),
            Self::Xz => Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]),
            Self::Lz4 => Some(&[0x04, 0x22, 0x4d, 0x18]),
            Self::None => None,
        }
    }

    #[must_use]
    pub fn default_level(self) -> u32 {
        match self {
            Self::Gzip => 5,
            Self::Zstd => 3,
            Self::Bzip2 | Self::Xz => 6,
            Self::Lz4 => 1,
            Self::None => 0,
        }
    }

    /// Pick a format from the file extension; `None` when nothing matches.
    ///
    /// Matching is case-insensitive and looks only at the final extension,
    /// so `data.csv.gz` is gzip.
    pub fn detect(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy().to_lowercase();
        Self::DETECTABLE
            .into_iter()
            .find(|c| c.extensions().iter().any(|ext| path.ends_with(ext)))
            .unwrap_or(Self::None)
    }

    /// Pick a format from the first bytes of a stream.
    #[must_use]
    pub fn from_magic(bytes: &[u8]) -> Self {
        Self::DETECTABLE
            .into_iter()
            .find(|c| c.magic_bytes().is_some_and(|magic| bytes.starts_with(magic)))
            .unwrap_or(Self::None)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(Self::Gzip),
            "zstd" | "zst" => Ok(Self::Zstd),
            "bzip2" | "bz2" => Ok(Self::Bzip2),
            "xz" => Ok(Self::Xz),
            "lz4" => Ok(Self::Lz4),
            "none" | "" => Ok(Self::None),
            other => Err(StreamError::composition(format!("unsupported compression type: {other}"))),
        }
    }
}

// ============================================================================
// Codec plumbing
// ============================================================================

/// Incremental codec state: bytes in, whatever output is ready out.
pub trait ChunkCodec: Send {
    fn push(&mut self, input: &[u8]) -> io::Result<Vec<u8>>;

    /// End the stream and return the remaining output.
    fn finish(self: Box<Self>) -> io::Result<Vec<u8>>;
}

/// Pluggable in-process compression codec.
///
/// Implementations must be `Send + Sync`; they live in a global registry.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip", "zstd").
    fn name(&self) -> &str;

    /// Lowercase file extensions, leading dot included.
    fn extensions(&self) -> &[&str];

    fn magic_bytes(&self) -> Option<&[u8]>;

    fn decoder(&self) -> io::Result<Box<dyn ChunkCodec>>;

    /// `level` of `None` means the codec's default.
    fn encoder(&self, level: Option<u32>) -> io::Result<Box<dyn ChunkCodec>>;
}

static CODEC_REGISTRY: RwLock<Option<Vec<Arc<dyn CompressionCodec>>>> = RwLock::new(None);

fn init_registry() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
        #[cfg(feature = "compression-bzip2")]
        Arc::new(Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Arc::new(XzCodec),
    ]
}

fn registry() -> Vec<Arc<dyn CompressionCodec>> {
    let mut lock = CODEC_REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).clone()
}

/// Register a custom codec. Later lookups see it after the built-in codecs.
pub fn register_codec(codec: Arc<dyn CompressionCodec>) {
    let mut lock = CODEC_REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).push(codec);
}

/// Registered codec with the given name.
#[must_use]
pub fn find_codec(name: &str) -> Option<Arc<dyn CompressionCodec>> {
    registry().into_iter().find(|codec| codec.name() == name)
}

/// First registered codec whose extension ends `path` (case-insensitive).
pub fn detect_codec(path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
    let path = path.as_ref().to_string_lossy().to_lowercase();
    registry()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| path.ends_with(ext)))
}

/// First registered codec whose magic bytes start `bytes`.
#[must_use]
pub fn detect_codec_from_magic(bytes: &[u8]) -> Option<Arc<dyn CompressionCodec>> {
    registry()
        .into_iter()
        .find(|codec| codec.magic_bytes().is_some_and(|magic| bytes.starts_with(magic)))
}

fn builtin(compression: Compression) -> Result<Arc<dyn CompressionCodec>, StreamError> {
    find_codec(compression.name()).ok_or_else(|| {
        StreamError::composition(format!("{compression} support is not compiled in"))
    })
}

struct CodecOperator {
    codec: Option<Box<dyn ChunkCodec>>,
}

impl Operator<Vec<u8>, Vec<u8>> for CodecOperator {
    fn transform(&mut self, chunk: Vec<u8>, out: &mut Vec<Vec<u8>>) -> Result<(), StreamError> {
        if let Some(codec) = self.codec.as_mut() {
            let bytes = codec.push(&chunk)?;
            if !bytes.is_empty() {
                out.push(bytes);
            }
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut Vec<Vec<u8>>) -> Result<(), StreamError> {
        if let Some(codec) = self.codec.take() {
            let bytes = codec.finish()?;
            if !bytes.is_empty() {
                out.push(bytes);
            }
        }
        Ok(())
    }
}

fn codec_transform(codec: Box<dyn ChunkCodec>) -> Transform<Vec<u8>, Vec<u8>> {
    Transform::from_operator(CodecOperator { codec: Some(codec) })
}

/// Transform that decompresses `compression`-encoded bytes.
///
/// # Errors
/// When the codec's feature is disabled or the codec fails to initialise.
pub fn decompress(compression: Compression) -> Result<Transform<Vec<u8>, Vec<u8>>, StreamError> {
    debug!(%compression, "decompress");
    match compression {
        Compression::None => Ok(pass_through()),
        Compression::Lz4 => Ok(spawn_transform("lz4", ["-d"])),
        other => decompress_with(builtin(other)?.as_ref()),
    }
}

/// Transform that compresses bytes with `compression` at `level`.
///
/// # Errors
/// When the codec's feature is disabled or rejects the level.
pub fn compress(compression: Compression, level: Option<u32>) -> Result<Transform<Vec<u8>, Vec<u8>>, StreamError> {
    debug!(%compression, level, "compress");
    match compression {
        Compression::None => Ok(pass_through()),
        Compression::Lz4 => {
            let level = level.unwrap_or(compression.default_level());
            Ok(spawn_transform("lz4", [format!("-{level}")]))
        }
        other => compress_with(builtin(other)?.as_ref(), level),
    }
}

/// [`decompress`] through any registered or ad-hoc codec.
///
/// # Errors
/// When the codec fails to initialise.
pub fn decompress_with(codec: &dyn CompressionCodec) -> Result<Transform<Vec<u8>, Vec<u8>>, StreamError> {
    Ok(codec_transform(codec.decoder()?))
}

/// [`compress`] through any registered or ad-hoc codec.
///
/// # Errors
/// When the codec fails to initialise.
pub fn compress_with(codec: &dyn CompressionCodec, level: Option<u32>) -> Result<Transform<Vec<u8>, Vec<u8>>, StreamError> {
    Ok(codec_transform(codec.encoder(level)?))
}

/// Compress a whole buffer in-process.
///
/// # Errors
/// For lz4 (external only), a disabled codec, or a codec failure.
pub fn compress_bytes(compression: Compression, data: &[u8], level: Option<u32>) -> io::Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4 => Err(io::Error::new(io::ErrorKind::Unsupported, "lz4 is only available as a process")),
        other => {
            let codec = builtin(other).map_err(io::Error::other)?;
            let mut encoder = codec.encoder(level)?;
            let mut out = encoder.push(data)?;
            out.extend(encoder.finish()?);
            Ok(out)
        }
    }
}

/// Decompress a whole buffer in-process.
///
/// # Errors
/// For lz4 (external only), a disabled codec, or malformed input.
pub fn decompress_bytes(compression: Compression, data: &[u8]) -> io::Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4 => Err(io::Error::new(io::ErrorKind::Unsupported, "lz4 is only available as a process")),
        other => {
            let codec = builtin(other).map_err(io::Error::other)?;
            let mut decoder = codec.decoder()?;
            let mut out = decoder.push(data)?;
            out.extend(decoder.finish()?);
            Ok(out)
        }
    }
}

// ============================================================================
// Built-in codec implementations
// ============================================================================

/// Write-side codec over an in-memory sink.
trait IncrementalWriter: Write + Send {
    /// Decoders flush after every chunk so output is never held back;
    /// encoders keep their window and emit as blocks complete.
    const FLUSH_EACH_CHUNK: bool;

    fn sink(&mut self) -> &mut Vec<u8>;

    /// End the stream and return the output not yet taken from the sink.
    ///
    /// Decoders fail with `UnexpectedEof` on a truncated stream.
    fn finalize(&mut self) -> io::Result<Vec<u8>>;
}

macro_rules! incremental_writer {
    ($feature:literal, $ty:ty, $finalize:ident, flush = $flush:literal) => {
        #[cfg(feature = $feature)]
        impl IncrementalWriter for $ty {
            const FLUSH_EACH_CHUNK: bool = $flush;

            fn sink(&mut self) -> &mut Vec<u8> {
                self.get_mut()
            }

            fn finalize(&mut self) -> io::Result<Vec<u8>> {
                self.$finalize()?;
                Ok(std::mem::take(self.get_mut()))
            }
        }
    };
}

incremental_writer!("compression-gzip", flate2::write::GzEncoder<Vec<u8>>, try_finish, flush = false);
incremental_writer!("compression-gzip", flate2::write::GzDecoder<Vec<u8>>, try_finish, flush = true);
incremental_writer!("compression-zstd", zstd::stream::write::Encoder<'static, Vec<u8>>, do_finish, flush = false);
incremental_writer!("compression-bzip2", bzip2::write::BzEncoder<Vec<u8>>, try_finish, flush = false);
incremental_writer!("compression-bzip2", bzip2::write::BzDecoder<Vec<u8>>, try_finish, flush = true);
incremental_writer!("compression-xz", xz2::write::XzEncoder<Vec<u8>>, try_finish, flush = false);

/// Raw zstd decoding; `finish` rejects a frame that never completed.
#[cfg(feature = "compression-zstd")]
type ZstdDecodeWriter = zstd::stream::zio::Writer<Vec<u8>, zstd::stream::raw::Decoder<'static>>;

#[cfg(feature = "compression-zstd")]
impl IncrementalWriter for ZstdDecodeWriter {
    const FLUSH_EACH_CHUNK: bool = true;

    fn sink(&mut self) -> &mut Vec<u8> {
        self.writer_mut()
    }

    fn finalize(&mut self) -> io::Result<Vec<u8>> {
        self.finish()?;
        Ok(std::mem::take(self.writer_mut()))
    }
}

// `finish` hands the sink back, leaving the decoder without one.
#[cfg(feature = "compression-xz")]
impl IncrementalWriter for xz2::write::XzDecoder<Vec<u8>> {
    const FLUSH_EACH_CHUNK: bool = true;

    fn sink(&mut self) -> &mut Vec<u8> {
        self.get_mut()
    }

    fn finalize(&mut self) -> io::Result<Vec<u8>> {
        self.finish()
    }
}

struct WriteCodec<W>(W);

impl<W: IncrementalWriter> ChunkCodec for WriteCodec<W> {
    fn push(&mut self, input: &[u8]) -> io::Result<Vec<u8>> {
        self.0.write_all(input)?;
        if W::FLUSH_EACH_CHUNK {
            self.0.flush()?;
        }
        Ok(std::mem::take(self.0.sink()))
    }

    fn finish(mut self: Box<Self>) -> io::Result<Vec<u8>> {
        self.0.finalize()
    }
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        Compression::Gzip.extensions()
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Compression::Gzip.magic_bytes()
    }

    fn decoder(&self) -> io::Result<Box<dyn ChunkCodec>> {
        Ok(Box::new(WriteCodec(flate2::write::GzDecoder::new(Vec::new()))))
    }

    fn encoder(&self, level: Option<u32>) -> io::Result<Box<dyn ChunkCodec>> {
        let level = flate2::Compression::new(level.unwrap_or(Compression::Gzip.default_level()));
        Ok(Box::new(WriteCodec(flate2::write::GzEncoder::new(Vec::new(), level))))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        Compression::Zstd.extensions()
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Compression::Zstd.magic_bytes()
    }

    fn decoder(&self) -> io::Result<Box<dyn ChunkCodec>> {
        let decoder = zstd::stream::raw::Decoder::new()?;
        Ok(Box::new(WriteCodec(ZstdDecodeWriter::new(Vec::new(), decoder))))
    }

    fn encoder(&self, level: Option<u32>) -> io::Result<Box<dyn ChunkCodec>> {
        let level = level.unwrap_or(Compression::Zstd.default_level());
        let level = i32::try_from(level).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "zstd level out of range"))?;
        Ok(Box::new(WriteCodec(zstd::stream::write::Encoder::new(Vec::new(), level)?)))
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        Compression::Bzip2.extensions()
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Compression::Bzip2.magic_bytes()
    }

    fn decoder(&self) -> io::Result<Box<dyn ChunkCodec>> {
        Ok(Box::new(WriteCodec(bzip2::write::BzDecoder::new(Vec::new()))))
    }

    fn encoder(&self, level: Option<u32>) -> io::Result<Box<dyn ChunkCodec>> {
        let level = bzip2::Compression::new(level.unwrap_or(Compression::Bzip2.default_level()).clamp(1, 9));
        Ok(Box::new(WriteCodec(bzip2::write::BzEncoder::new(Vec::new(), level))))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        Compression::Xz.extensions()
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Compression::Xz.magic_bytes()
    }

    fn decoder(&self) -> io::Result<Box<dyn ChunkCodec>> {
        Ok(Box::new(WriteCodec(xz2::write::XzDecoder::new(Vec::new()))))
    }

    fn encoder(&self, level: Option<u32>) -> io::Result<Box<dyn ChunkCodec>> {
        let level = level.unwrap_or(Compression::Xz.default_level()).min(9);
        Ok(Box::new(WriteCodec(xz2::write::XzEncoder::new(Vec::new(), level))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_extension() {
        assert_eq!(Compression::detect("data.csv.GZ"), Compression::Gzip);
        assert_eq!(Compression::detect("/tmp/x.ndjson.zst"), Compression::Zstd);
        assert_eq!(Compression::detect("x.tsv.lz4"), Compression::Lz4);
        assert_eq!(Compression::detect("x.csv"), Compression::None);
    }

    #[test]
    fn detect_by_magic() {
        assert_eq!(Compression::from_magic(&[0x1f, 0x8b, 0x08]), Compression::Gzip);
        assert_eq!(Compression::from_magic(b"BZh91AY"), Compression::Bzip2);
        assert_eq!(Compression::from_magic(b"plain"), Compression::None);
    }

    #[test]
    fn brotli_is_rejected() {
        assert!("brotli".parse::<Compression>().is_err());
        assert_eq!("GZ".parse::<Compression>().unwrap(), Compression::Gzip);
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn gzip_bytes_round_trip() {
        let data = b"hello hello hello hello".repeat(10);
        let packed = compress_bytes(Compression::Gzip, &data, None).unwrap();
        assert!(packed.starts_with(&[0x1f, 0x8b]));
        assert_eq!(decompress_bytes(Compression::Gzip, &packed).unwrap(), data);
    }

    #[cfg(any(feature = "compression-zstd", feature = "compression-xz"))]
    fn decompress_first_half(compression: Compression) -> io::Result<Vec<u8>> {
        let data: Vec<u8> = (0..5_000u32).flat_map(|i| format!("{i},").into_bytes()).collect();
        let packed = compress_bytes(compression, &data, None).unwrap();
        decompress_bytes(compression, &packed[..packed.len() / 2])
    }

    #[cfg(feature = "compression-zstd")]
    #[test]
    fn truncated_zstd_frame_is_unexpected_eof() {
        let err = decompress_first_half(Compression::Zstd).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[cfg(feature = "compression-xz")]
    #[test]
    fn truncated_xz_stream_fails() {
        assert!(decompress_first_half(Compression::Xz).is_err());
    }

    #[cfg(feature = "compression-xz")]
    #[test]
    fn xz_bytes_round_trip() {
        let data = b"xz xz xz xz".repeat(50);
        let packed = compress_bytes(Compression::Xz, &data, Some(1)).unwrap();
        assert_eq!(decompress_bytes(Compression::Xz, &packed).unwrap(), data);
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn registry_knows_builtins() {
        assert!(find_codec("gzip").is_some());
        assert_eq!(detect_codec("a.json.gzip").map(|c| c.name().to_owned()), Some("gzip".into()));
        assert!(detect_codec_from_magic(&[0x1f, 0x8b]).is_some());
    }
}
