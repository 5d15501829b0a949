// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Error taxonomy for the unpack → sniff → repack pipeline.
//!
//! Only request-level failures are errors. A single attachment that cannot be
//! classified or read is recorded as a skipped outcome in the report instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::logic::pipeline::Stage;

/// Message shown when no container was supplied.
pub const MSG_INPUT_MISSING: &str = "No file was uploaded.";
/// Message shown when the container lacks the `attachments` directory.
pub const MSG_MISSING_ATTACHMENTS: &str = "Attachments folder not found in the uploaded file.";
/// Message shown for every other failure.
pub const MSG_PROCESSING_FAILED: &str = "An error occurred while processing the file.";

/// The container could not be unpacked.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Not a ZIP archive, or its central directory is unreadable.
    #[error("container is not a valid archive: {0}")]
    InvalidArchive(#[source] zip::result::ZipError),

    /// An entry could not be opened or decompressed.
    #[error("failed to decompress entry {name}: {source}")]
    CorruptEntry {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The extracted tree could not be written.
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The output archive could not be assembled.
#[derive(Error, Debug)]
pub enum PackError {
    /// A source file or the source directory could not be read.
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing or finalizing the ZIP stream failed.
    #[error("failed to write archive entry {name}: {source}")]
    Zip {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Request-level failure. Any of these ends the request in [`Stage::Failed`].
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No container was supplied, or it was empty.
    #[error("no input provided")]
    InputMissing,

    /// The request's working directory could not be prepared.
    #[error("failed to prepare working directory under {root:?}: {source}")]
    Workspace {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The archive is valid but has no top-level `attachments` directory.
    #[error("attachments folder not found in container (looked for {0:?})")]
    MissingAttachments(PathBuf),

    /// The `attachments` directory exists but cannot be listed.
    #[error("failed to list attachments in {path:?}: {source}")]
    AttachmentsUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A renamed attachment could not be written to the output set.
    #[error("failed to write renamed attachment {path:?}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Pack(#[from] PackError),

    /// The configured per-request deadline elapsed.
    #[error("deadline exceeded during {0}")]
    DeadlineExceeded(Stage),
}

impl PipelineError {
    /// Stage of the request state machine in which the failure happened.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InputMissing => Stage::Received,
            PipelineError::Workspace { .. } | PipelineError::Extraction(_) => Stage::Extracting,
            PipelineError::MissingAttachments(_) => Stage::Validating,
            PipelineError::AttachmentsUnreadable { .. } | PipelineError::OutputWrite { .. } => {
                Stage::Processing
            }
            PipelineError::Pack(_) => Stage::Packing,
            PipelineError::DeadlineExceeded(stage) => *stage,
        }
    }

    /// Short message suitable for the caller; details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::InputMissing => MSG_INPUT_MISSING,
            PipelineError::MissingAttachments(_) => MSG_MISSING_ATTACHMENTS,
            _ => MSG_PROCESSING_FAILED,
        }
    }

    /// Process exit code for the CLI transport.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::InputMissing => 2,
            PipelineError::MissingAttachments(_) => 3,
            _ => 1,
        }
    }
}
