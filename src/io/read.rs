//! Byte sources for local files and HTTP(S) URLs.

use crate::stream::Source;
use anyhow::{Context, Result};
use tracing::debug;

/// Open `location` as a chunked byte source.
///
/// `http://` and `https://` locations are fetched with `reqwest` (feature
/// `io-http`); anything else is a local path. The size comes from file
/// metadata or the `Content-Length` header when available.
///
/// # Errors
/// When the file cannot be opened or the request fails before the body
/// starts. Failures while streaming the body arrive as stream errors.
pub async fn read(location: &str) -> Result<(Source<Vec<u8>>, Option<u64>)> {
    if is_url(location) {
        return read_http(location).await;
    }
    let file = tokio::fs::File::open(location)
        .await
        .with_context(|| format!("open {location}"))?;
    let size = file
        .metadata()
        .await
        .with_context(|| format!("stat {location}"))?
        .len();
    debug!(location, size, "reading local file");
    Ok((Source::from_reader(file), Some(size)))
}

pub(crate) fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

#[cfg(feature = "io-http")]
async fn read_http(url: &str) -> Result<(Source<Vec<u8>>, Option<u64>)> {
    use crate::error::StreamError;
    use futures::TryStreamExt;

    let response = reqwest::get(url)
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?;
    let size = response.content_length();
    debug!(url, size, "reading remote body");
    let body = response
        .bytes_stream()
        .map_ok(|chunk| chunk.to_vec())
        .map_err(|err| StreamError::Http(err.to_string()));
    Ok((Source::from_results(body), size))
}

#[cfg(not(feature = "io-http"))]
async fn read_http(url: &str) -> Result<(Source<Vec<u8>>, Option<u64>)> {
    anyhow::bail!("cannot fetch {url}: built without the `io-http` feature")
}
