//! Stable content hashing.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::LcError;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable hexadecimal SHA-256 for the provided serializable value.
///
/// The digest is taken over canonical JSON, so it does not depend on map
/// iteration order or on the process that computed it.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, LcError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(bytes);
    Ok(format!("{:x}", digest))
}
