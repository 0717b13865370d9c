//! URL-safe base64 and gzip helpers.
//!
//! The codec never interprets contents; a failed decode is a signalled
//! error, not a fallback.

use std::io::{Read, Write};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{CoreError, CoreResult};

/// Encode bytes as URL-safe base64 without padding.
pub fn b64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode URL-safe base64, tolerating padded input.
pub fn b64url_decode(s: &str) -> CoreResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s.trim_end_matches('='))
        .map_err(|e| CoreError::Validation(format!("invalid base64url: {}", e)))
}

pub fn gzip_compress(raw: &[u8]) -> CoreResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(raw)
        .and_then(|_| encoder.finish())
        .map_err(|e| CoreError::Validation(format!("gzip failed: {}", e)))
}

pub fn gzip_decompress(data: &[u8]) -> CoreResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CoreError::Validation(format!("gunzip failed: {}", e)))?;
    Ok(out)
}
