// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Domain layer: pure data types shared between the pipeline stages and the CLI.

pub mod attachment;
pub mod report;
pub mod upload;

pub use attachment::{AttachmentEntry, AttachmentOutcome, ClassifiedAttachment, SkipReason};
pub use report::{ProcessReport, ProcessedArchive};
pub use upload::Upload;
