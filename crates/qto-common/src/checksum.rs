//! Checksum utilities for upload integrity

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;

/// Compute the SHA-256 digest of an in-memory payload as lowercase hex.
///
/// Used by the ingestion gateway to fingerprint accepted uploads before they
/// are forwarded to the translation service.
pub fn sha256_hex(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-256 digest of any readable source as lowercase hex.
pub fn sha256_hex_reader<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
