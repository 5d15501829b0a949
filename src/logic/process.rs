// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Attachment loop: read, classify, rename, copy.
//!
//! Per-file problems (no matching signature, unreadable file) are recorded in
//! the report and the loop carries on. Only directory-level failures abort.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::CollisionPolicy;
use crate::error::PipelineError;
use crate::logic::pipeline::Stage;
use crate::logic::signature::{FileTag, classify, leading_hex};
use crate::models::{
    AttachmentEntry, AttachmentOutcome, ClassifiedAttachment, ProcessReport, SkipReason,
};
use crate::utils::hash_bytes;

/// Knobs for [`process_with`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessOptions {
    pub collisions: CollisionPolicy,
    /// Checked before each attachment.
    pub deadline: Option<Instant>,
}

/// Classify every file in `attachments_dir` and copy the resolved ones into `output_dir`.
///
/// Uses the default options: last writer wins on name collisions, no deadline.
pub fn process(attachments_dir: &Path, output_dir: &Path) -> Result<ProcessReport, PipelineError> {
    process_with(attachments_dir, output_dir, &ProcessOptions::default())
}

/// Classify every file in `attachments_dir` and copy the resolved ones into `output_dir`.
///
/// Only regular files directly inside `attachments_dir` are considered, in
/// file-name order. Each resolved file is written as `<stem>.<tag>`.
///
/// # Errors
///
/// [`PipelineError::AttachmentsUnreadable`] when the directory cannot be listed,
/// [`PipelineError::OutputWrite`] when a renamed copy cannot be written and
/// [`PipelineError::DeadlineExceeded`] when `options.deadline` passes.
pub fn process_with(
    attachments_dir: &Path,
    output_dir: &Path,
    options: &ProcessOptions,
) -> Result<ProcessReport, PipelineError> {
    let files = list_files(attachments_dir)?;
    debug!(count = files.len(), "Files in attachments folder: {:?}", files);

    let mut report = ProcessReport::default();
    // Output name -> index of the outcome that currently owns it.
    let mut taken: HashMap<String, usize> = HashMap::new();

    for path in files {
        if options.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(PipelineError::DeadlineExceeded(Stage::Processing));
        }

        let source_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!(attachment = %source_name, error = %err, "Could not read attachment");
                report.push(AttachmentOutcome::Skipped {
                    source_name,
                    reason: SkipReason::Unreadable {
                        error: err.to_string(),
                    },
                });
                continue;
            }
        };

        let entry = AttachmentEntry::new(source_name, content);
        let outcome = match classify(&entry.content) {
            Some(tag) => {
                let output_name = output_name(&entry, tag, options.collisions, &taken);
                if let Some(&earlier) = taken.get(&output_name) {
                    warn!(
                        attachment = %entry.name,
                        replaces = %report.outcomes[earlier].source_name(),
                        output = %output_name,
                        "Overwriting earlier attachment with the same name"
                    );
                    report.supersede(earlier, &entry.name);
                }
                taken.insert(output_name.clone(), report.outcomes.len());
                write_renamed(&entry, tag, output_dir, output_name)?
            }
            None => {
                let leading_bytes = leading_hex(&entry.content);
                warn!(
                    attachment = %entry.name,
                    leading_bytes = %leading_bytes,
                    "Could not determine file type"
                );
                AttachmentOutcome::Skipped {
                    source_name: entry.name,
                    reason: SkipReason::Unclassified { leading_bytes },
                }
            }
        };
        report.push(outcome);
    }

    Ok(report)
}

/// Regular files directly under `dir`, sorted by name.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let unreadable = |source| PipelineError::AttachmentsUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for dir_entry in fs::read_dir(dir).map_err(unreadable)? {
        let dir_entry = dir_entry.map_err(unreadable)?;
        match dir_entry.file_type() {
            Ok(file_type) if file_type.is_file() => files.push(dir_entry.path()),
            Ok(_) => debug!(path = ?dir_entry.path(), "Skipping non-file attachment entry"),
            Err(err) => warn!(path = ?dir_entry.path(), error = %err, "Could not stat attachment"),
        }
    }
    files.sort();
    Ok(files)
}

/// Pick the output name for a resolved attachment under the collision policy.
///
/// Under [`CollisionPolicy::Overwrite`] the name may already be in `taken`;
/// the caller then retires the earlier owner.
fn output_name(
    entry: &AttachmentEntry,
    tag: FileTag,
    policy: CollisionPolicy,
    taken: &HashMap<String, usize>,
) -> String {
    let base = entry.renamed(tag);
    match policy {
        CollisionPolicy::Overwrite => base,
        CollisionPolicy::Suffix => {
            let stem = entry.stem();
            let mut candidate = base;
            let mut n = 1;
            while taken.contains_key(&candidate) {
                candidate = format!("{stem}-{n}.{}", tag.as_str());
                n += 1;
            }
            candidate
        }
    }
}

fn write_renamed(
    entry: &AttachmentEntry,
    tag: FileTag,
    output_dir: &Path,
    output_name: String,
) -> Result<AttachmentOutcome, PipelineError> {
    let target = output_dir.join(&output_name);
    fs::write(&target, &entry.content).map_err(|source| PipelineError::OutputWrite {
        path: target.clone(),
        source,
    })?;
    info!(attachment = %entry.name, output = %output_name, "Renamed and copied attachment");

    Ok(AttachmentOutcome::Classified(ClassifiedAttachment {
        source_name: entry.name.clone(),
        output_name,
        tag,
        mime: tag.mime(),
        size: entry.content.len() as u64,
        sha256: hash_bytes(&entry.content),
    }))
}
