#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-bzip2",
    feature = "compression-xz"
))]
mod compression_tests {
    use anyhow::Result;
    use ironstream::io::compression::{
        compress, compress_bytes, decompress, decompress_bytes, decompress_with, detect_codec, detect_codec_from_magic,
        find_codec, register_codec, ChunkCodec, CompressionCodec,
    };
    use ironstream::io::Compression;
    use ironstream::testing::chunked;
    use ironstream::from_iter;
    use std::io;
    use std::sync::Arc;

    fn payload() -> Vec<u8> {
        (0..20_000u32).flat_map(|i| format!("row {i}\n").into_bytes()).collect()
    }

    fn enabled() -> Vec<Compression> {
        [Compression::Gzip, Compression::Zstd, Compression::Bzip2, Compression::Xz]
            .into_iter()
            .filter(|c| find_codec(c.name()).is_some())
            .collect()
    }

    #[tokio::test]
    async fn chunked_round_trip_through_transforms() -> Result<()> {
        let data = payload();
        for compression in enabled() {
            let packed = from_iter(chunked(&data, 777))
                .merge(compress(compression, None)?)
                .to_bytes()
                .await?;
            assert!(packed.len() < data.len(), "{compression} did not shrink the payload");

            let unpacked = from_iter(chunked(&packed, 101))
                .merge(decompress(compression)?)
                .to_bytes()
                .await?;
            assert_eq!(unpacked, data, "{compression} round trip");
        }
        Ok(())
    }

    #[tokio::test]
    async fn transform_output_matches_whole_buffer_codec() -> Result<()> {
        let data = payload();
        for compression in enabled() {
            let packed = compress_bytes(compression, &data, Some(compression.default_level()))?;
            let streamed = from_iter(chunked(&packed, 4096))
                .merge(decompress(compression)?)
                .to_bytes()
                .await?;
            assert_eq!(streamed, decompress_bytes(compression, &packed)?);
        }
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_input_fails_the_stream() -> Result<()> {
        for compression in enabled() {
            let mut packed = compress_bytes(compression, &payload(), None)?;
            packed[0] ^= 0xff;
            packed[1] ^= 0xff;
            let result = from_iter(vec![packed]).merge(decompress(compression)?).to_bytes().await;
            assert!(result.is_err(), "{compression} accepted corrupt input");
        }
        Ok(())
    }

    #[tokio::test]
    async fn truncated_input_fails_the_stream() -> Result<()> {
        let data = payload();
        for compression in enabled() {
            let packed = compress_bytes(compression, &data, None)?;
            let half = &packed[..packed.len() / 2];
            let result = from_iter(chunked(half, 1024))
                .merge(decompress(compression)?)
                .to_bytes()
                .await;
            assert!(result.is_err(), "{compression} accepted truncated input");
        }
        Ok(())
    }

    #[tokio::test]
    async fn none_is_pass_through() -> Result<()> {
        let out = from_iter(vec![b"ab".to_vec(), b"c".to_vec()])
            .merge(compress(Compression::None, None)?)
            .merge(decompress(Compression::None)?)
            .collect_vec()
            .await?;
        assert_eq!(out, vec![b"ab".to_vec(), b"c".to_vec()]);
        Ok(())
    }

    #[test]
    fn detection_by_extension_and_magic() -> Result<()> {
        assert_eq!(Compression::detect("data.csv.GZ"), Compression::Gzip);
        assert_eq!(Compression::detect("data.csv.zst"), Compression::Zstd);
        assert_eq!(Compression::detect("data.csv"), Compression::None);
        for compression in enabled() {
            let packed = compress_bytes(compression, b"hello", None)?;
            assert_eq!(Compression::from_magic(&packed), compression);
            let codec = detect_codec_from_magic(&packed).map(|c| c.name().to_owned());
            assert_eq!(codec.as_deref(), Some(compression.name()));
        }
        Ok(())
    }

    #[test]
    fn lz4_is_not_available_in_process() {
        let err = compress_bytes(Compression::Lz4, b"x", None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    /// Reverses bytes on the way in and out; only meaningful for single chunks.
    struct Mirror;

    struct MirrorState(Vec<u8>);

    impl ChunkCodec for MirrorState {
        fn push(&mut self, input: &[u8]) -> io::Result<Vec<u8>> {
            self.0.extend_from_slice(input);
            Ok(Vec::new())
        }

        fn finish(self: Box<Self>) -> io::Result<Vec<u8>> {
            Ok(self.0.into_iter().rev().collect())
        }
    }

    impl CompressionCodec for Mirror {
        fn name(&self) -> &str {
            "mirror"
        }

        fn extensions(&self) -> &[&str] {
            &[".mirror"]
        }

        fn magic_bytes(&self) -> Option<&[u8]> {
            None
        }

        fn decoder(&self) -> io::Result<Box<dyn ChunkCodec>> {
            Ok(Box::new(MirrorState(Vec::new())))
        }

        fn encoder(&self, _level: Option<u32>) -> io::Result<Box<dyn ChunkCodec>> {
            Ok(Box::new(MirrorState(Vec::new())))
        }
    }

    #[tokio::test]
    async fn registered_codec_is_found_by_extension() -> Result<()> {
        register_codec(Arc::new(Mirror));
        let codec = detect_codec("notes.txt.mirror").ok_or_else(|| anyhow::anyhow!("codec not registered"))?;
        assert_eq!(codec.name(), "mirror");

        let out = from_iter(vec![b"olleh".to_vec()])
            .merge(decompress_with(codec.as_ref())?)
            .to_text()
            .await?;
        assert_eq!(out, "hello");
        Ok(())
    }
}
