//! Content fingerprints naming persistent stores.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 16;

/// Short SHA-256 fingerprint of a serializable value.
///
/// The value is serialized to JSON first, so equal values always share a
/// fingerprint. A store opened for one mapping is thereby never reused for
/// another.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    let digest = Sha256::digest(&json);
    let mut hex = format!("{:x}", digest);
    hex.truncate(FINGERPRINT_LEN);
    Ok(hex)
}
