// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Shared helper utilities reused by the pipeline and the CLI.

pub mod hash;
pub mod sanitize_component;

/// Compute the SHA-256 hash of a buffer.
pub use hash::hash_bytes;
/// Sanitize untrusted names into filesystem-safe path components.
pub use sanitize_component::sanitize_component;
