//! Gzip compression and lenient JSON decoding.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;

/// Compresses bytes with gzip at the default level.
///
/// # Errors
///
/// Returns an error if the encoder fails.
pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).context("gzip encode failed")?;
    encoder.finish().context("gzip finish failed")
}

/// Decompresses a gzip stream.
///
/// # Errors
///
/// Returns an error if the input is not valid gzip.
pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut decoded)
        .context("gzip decode failed")?;
    Ok(decoded)
}

/// Decodes JSON text into `T`, with one lenient retry.
///
/// The retry drops NUL bytes, byte-order marks and replacement characters
/// left by lossy UTF-8 decoding, then reads the first complete JSON value
/// and ignores any trailing garbage.
///
/// # Errors
///
/// Returns an error if both the strict and the lenient decode fail.
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(strict) => {
            tracing::debug!(error = %strict, "Strict JSON decode failed, retrying leniently");
            let cleaned: String = text
                .chars()
                .filter(|c| !matches!(c, '\0' | '\u{feff}' | '\u{fffd}'))
                .collect();
            let mut stream = serde_json::Deserializer::from_str(&cleaned).into_iter::<T>();
            match stream.next() {
                Some(Ok(value)) => Ok(value),
                Some(Err(lenient)) => {
                    Err(lenient).with_context(|| format!("malformed JSON ({strict})"))
                }
                None => Err(strict).context("empty JSON payload"),
            }
        }
    }
}
