// Whole-body HTTP fetch for URL sources

use std::io::Read;
use std::time::Duration;
use tonearm_core::{AudioError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a fetched body (512 MiB)
const MAX_BODY_BYTES: u64 = 512 * 1024 * 1024;

/// Download `url` into memory
pub fn fetch_url(url: &str) -> Result<Vec<u8>> {
    log::info!("Fetching audio from URL: {}", url);

    let response = ureq::get(url)
        .timeout(REQUEST_TIMEOUT)
        .call()
        .map_err(|e| AudioError::NetworkError(format!("GET {} failed: {}", url, e)))?;

    let body = read_body(response.into_reader(), MAX_BODY_BYTES, url)?;
    log::debug!("Fetched {} bytes from {}", body.len(), url);
    Ok(body)
}

/// Read at most `limit` bytes; a longer body is an error rather than a truncation
fn read_body(reader: impl Read, limit: u64, url: &str) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut body)
        .map_err(|e| AudioError::NetworkError(format!("reading {} failed: {}", url, e)))?;

    if body.len() as u64 > limit {
        return Err(AudioError::NetworkError(format!(
            "{} is larger than {} bytes",
            url, limit
        )));
    }
    Ok(body)
}
