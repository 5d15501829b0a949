// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Attachment domain model: raw entries and their per-file outcomes.

use std::path::Path;

use serde::Serialize;

use crate::logic::signature::FileTag;

/// A file read from the container's `attachments` directory.
///
/// The name is untrusted; only `content` decides the file type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentEntry {
    pub name: String,
    pub content: Vec<u8>,
}

impl AttachmentEntry {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    /// Name without its final extension (`scan.bin` → `scan`, `.hidden` → `.hidden`).
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Output name for a resolved tag: stem plus the tag's extension.
    pub fn renamed(&self, tag: FileTag) -> String {
        format!("{}.{}", self.stem(), tag.as_str())
    }
}

/// An attachment whose format was resolved and which was written to the output set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassifiedAttachment {
    /// Name inside the container's `attachments` directory.
    pub source_name: String,
    /// Name inside the output archive.
    pub output_name: String,
    pub tag: FileTag,
    pub mime: String,
    pub size: u64,
    pub sha256: String,
}

/// Why an attachment was left out of the output archive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// No signature matched; carries the hex of the leading bytes.
    Unclassified { leading_bytes: String },
    /// The file could not be read.
    Unreadable { error: String },
    /// A later attachment resolved to the same output name and replaced this one.
    Overwritten { by: String },
}

/// Result of handling one attachment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttachmentOutcome {
    Classified(ClassifiedAttachment),
    Skipped { source_name: String, reason: SkipReason },
}

impl AttachmentOutcome {
    pub fn source_name(&self) -> &str {
        match self {
            AttachmentOutcome::Classified(classified) => &classified.source_name,
            AttachmentOutcome::Skipped { source_name, .. } => source_name,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, AttachmentOutcome::Classified(_))
    }
}
