// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Request-scoped working directory.
//!
//! Every request gets its own directory under the configured work root, so
//! overlapping requests never see each other's files. The tree is removed when
//! the [`Workspace`] is dropped, whichever way the request ends.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::utils::sanitize_component;

const EXTRACTED_DIR: &str = "extracted";
const PROCESSED_DIR: &str = "processed";

/// Owned working directory holding `extracted/` and `processed/`.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create `<root>/<sanitized declared name>-<random>/` with both subdirectories.
    pub fn create(root: &Path, declared_name: &str) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let prefix = format!("{}-", sanitize_component(declared_name));
        let dir = tempfile::Builder::new().prefix(&prefix).tempdir_in(root)?;

        fs::create_dir(dir.path().join(EXTRACTED_DIR))?;
        fs::create_dir(dir.path().join(PROCESSED_DIR))?;

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Destination for the unpacked container tree.
    pub fn extracted_dir(&self) -> PathBuf {
        self.dir.path().join(EXTRACTED_DIR)
    }

    /// Destination for renamed attachments awaiting packing.
    pub fn processed_dir(&self) -> PathBuf {
        self.dir.path().join(PROCESSED_DIR)
    }

    /// Remove the tree now, surfacing failures that `Drop` would swallow.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}
