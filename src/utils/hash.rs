// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! SHA-256 digests for attachment content and produced archives.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of an in-memory buffer.
///
/// # Examples
///
/// ```rust
/// let digest = attachpack::utils::hash_bytes(b"%PDF-1.7");
/// assert_eq!(digest.len(), 64);
/// ```
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
