// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Output archive assembly.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

use crate::config::MAX_COMPRESSION_LEVEL;
use crate::error::PackError;

/// Suggested filename for the archive handed back to the caller.
pub const DOWNLOAD_NAME: &str = "processed_files.zip";

/// Pack every file in `source_dir` at maximum deflate compression.
pub fn pack(source_dir: &Path) -> Result<Vec<u8>, PackError> {
    pack_with_level(source_dir, MAX_COMPRESSION_LEVEL)
}

/// Pack every regular file directly in `source_dir` into a flat ZIP.
///
/// Entries are added in file-name order and stored under their bare file name.
/// The returned buffer is the complete, finalized archive; nothing is handed
/// out before the central directory has been written.
pub fn pack_with_level(source_dir: &Path, level: i64) -> Result<Vec<u8>, PackError> {
    let files = list_files(source_dir)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<'_, ()> = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level));

    for path in &files {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        zip.start_file(name.as_str(), options)
            .map_err(|source| PackError::Zip {
                name: name.clone(),
                source,
            })?;

        let mut reader = File::open(path).map_err(|source| PackError::Io {
            path: path.clone(),
            source,
        })?;
        io::copy(&mut reader, &mut zip).map_err(|source| PackError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(entry = %name, "Added file to output archive");
    }

    let cursor = zip.finish().map_err(|source| PackError::Zip {
        name: "<central directory>".to_string(),
        source,
    })?;
    Ok(cursor.into_inner())
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, PackError> {
    let io_err = |source| PackError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
