//! Loading raw record sources from disk or over HTTP.
//!
//! Sources ending in `.gz` are inflated before being handed to the CSV
//! readers.

mod http;

pub use http::{BasicClient, HttpClient};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::debug;

/// Fetches the body at `url`, failing on non-success status codes.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Reads `source` from a local path, or fetches it when it looks like an
/// `http(s)` URL.
#[tracing::instrument(skip(source), fields(source = %source))]
pub async fn load_source(source: &str) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        let client = BasicClient::new()?;
        fetch_bytes(&client, source)
            .await
            .with_context(|| format!("failed to fetch '{source}'"))?
    } else {
        std::fs::read(source).with_context(|| format!("failed to read '{source}'"))?
    };

    debug!(bytes = bytes.len(), "Source loaded");

    if is_gzip(source) {
        inflate(&bytes).with_context(|| format!("failed to decompress '{source}'"))
    } else {
        Ok(bytes)
    }
}

fn is_gzip(source: &str) -> bool {
    source
        .split(['?', '#'])
        .next()
        .is_some_and(|path| path.ends_with(".gz"))
}

/// Decompresses a gzip payload.
pub fn inflate(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn test_is_gzip() {
        assert!(is_gzip("data/events.csv.gz"));
        assert!(is_gzip("https://example.org/events.csv.gz?token=1"));
        assert!(!is_gzip("events.csv"));
    }

    #[test]
    fn test_inflate_round_trip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"sourceId,referenceTime\n").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(inflate(&compressed).unwrap(), b"sourceId,referenceTime\n");
    }

    #[test]
    fn test_inflate_rejects_plain_bytes() {
        assert!(inflate(b"not gzip").is_err());
    }

    #[tokio::test]
    async fn test_load_source_reads_local_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv.gz");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"a,b\n1,2\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let bytes = load_source(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");
    }

    #[test]
    fn test_basic_client_builds() {
        assert!(BasicClient::new().is_ok());
    }

    #[tokio::test]
    async fn test_load_source_missing_file() {
        assert!(load_source("/nonexistent/rows.csv").await.is_err());
    }
}
