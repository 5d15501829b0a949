// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Container unpacking and layout validation.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{ExtractionError, PipelineError};

/// Top-level directory inside a container that holds the attachments.
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Unpack a ZIP-structured container into `dest`.
///
/// Returns the paths of every file written. Entries whose path would escape
/// `dest` are skipped with a warning.
///
/// # Errors
///
/// [`ExtractionError::InvalidArchive`] when `container` is not a readable ZIP,
/// [`ExtractionError::CorruptEntry`] when an entry fails to decompress, and
/// [`ExtractionError::Io`] when the tree cannot be written.
pub fn extract(container: &[u8], dest: &Path) -> Result<BTreeSet<PathBuf>, ExtractionError> {
    let mut archive =
        ZipArchive::new(Cursor::new(container)).map_err(ExtractionError::InvalidArchive)?;

    let mut written = BTreeSet::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|err| ExtractionError::CorruptEntry {
            name: format!("#{index}"),
            source: io::Error::other(err),
        })?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let output_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&output_path).map_err(|source| ExtractionError::Io {
                path: output_path.clone(),
                source,
            })?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ExtractionError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut outfile = File::create(&output_path).map_err(|source| ExtractionError::Io {
            path: output_path.clone(),
            source,
        })?;
        // Read errors here are decompression or CRC failures in the stream.
        io::copy(&mut entry, &mut outfile).map_err(|source| ExtractionError::CorruptEntry {
            name: entry.name().to_string(),
            source,
        })?;

        written.insert(output_path);
    }

    debug!(files = ?written, "Extraction completed");
    Ok(written)
}

/// Locate the container's `attachments` directory under an extracted tree.
///
/// # Errors
///
/// [`PipelineError::MissingAttachments`] when the directory is absent or is a file.
pub fn attachments_dir(extracted_root: &Path) -> Result<PathBuf, PipelineError> {
    let dir = extracted_root.join(ATTACHMENTS_DIR);
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(PipelineError::MissingAttachments(dir))
    }
}
