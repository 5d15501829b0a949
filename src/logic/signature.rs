// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Leading-byte signature classifier.
//!
//! Attachment names inside a container carry no usable type information, so the
//! first four bytes are the only signal. The table is deliberately small: the
//! two MP4 entries match common `ftyp` box sizes only and are not a general
//! ISO-media detector.

use std::fmt;

use serde::Serialize;

/// Number of leading bytes compared against the signature table.
pub const MAGIC_LEN: usize = 4;

/// File formats the classifier can recognize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTag {
    Pdf,
    Png,
    Mp4,
}

impl FileTag {
    /// Extension used when renaming a classified attachment.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileTag::Pdf => "pdf",
            FileTag::Png => "png",
            FileTag::Mp4 => "mp4",
        }
    }

    /// MIME type guessed from the extension.
    pub fn mime(&self) -> String {
        mime_guess::from_ext(self.as_str())
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

impl fmt::Display for FileTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the signature table: a big-endian 4-byte magic and its tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    pub magic: u32,
    pub tag: FileTag,
}

/// Built-in signatures, checked in order.
pub const SIGNATURES: &[Signature] = &[
    // "%PDF"
    Signature {
        magic: 0x2550_4446,
        tag: FileTag::Pdf,
    },
    // "\x89PNG"
    Signature {
        magic: 0x8950_4e47,
        tag: FileTag::Png,
    },
    // ftyp box of 32 bytes
    Signature {
        magic: 0x0000_0020,
        tag: FileTag::Mp4,
    },
    // ftyp box of 24 bytes
    Signature {
        magic: 0x0000_0018,
        tag: FileTag::Mp4,
    },
];

/// Read the leading bytes as a big-endian value; `None` when fewer than four are present.
pub fn leading_magic(bytes: &[u8]) -> Option<u32> {
    let head: [u8; MAGIC_LEN] = bytes.get(..MAGIC_LEN)?.try_into().ok()?;
    Some(u32::from_be_bytes(head))
}

/// Classify content against [`SIGNATURES`].
pub fn classify(bytes: &[u8]) -> Option<FileTag> {
    classify_with(SIGNATURES, bytes)
}

/// Classify content against an explicit table; the first matching entry wins.
pub fn classify_with(table: &[Signature], bytes: &[u8]) -> Option<FileTag> {
    let magic = leading_magic(bytes)?;
    table
        .iter()
        .find(|signature| signature.magic == magic)
        .map(|signature| signature.tag)
}

/// Hex rendering of up to [`MAGIC_LEN`] leading bytes, for diagnostics.
pub fn leading_hex(bytes: &[u8]) -> String {
    hex::encode(&bytes[..bytes.len().min(MAGIC_LEN)])
}
