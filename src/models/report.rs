// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Per-request processing report.

use serde::Serialize;
use uuid::Uuid;

use crate::models::attachment::{AttachmentOutcome, ClassifiedAttachment, SkipReason};

/// Outcomes of the attachment loop, in processing order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub outcomes: Vec<AttachmentOutcome>,
}

impl ProcessReport {
    pub fn push(&mut self, outcome: AttachmentOutcome) {
        self.outcomes.push(outcome);
    }

    /// Mark the outcome at `index` as replaced by the later attachment `by`.
    ///
    /// Keeps the report in step with the output set when two attachments
    /// resolve to the same name and the later copy overwrites the earlier one.
    pub fn supersede(&mut self, index: usize, by: &str) {
        if let Some(outcome) = self.outcomes.get_mut(index) {
            let source_name = outcome.source_name().to_string();
            *outcome = AttachmentOutcome::Skipped {
                source_name,
                reason: SkipReason::Overwritten { by: by.to_string() },
            };
        }
    }

    /// Number of attachments written to the output set.
    pub fn classified_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_classified()).count()
    }

    /// Number of attachments left out of the output set.
    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.classified_count()
    }

    pub fn classified(&self) -> impl Iterator<Item = &ClassifiedAttachment> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            AttachmentOutcome::Classified(classified) => Some(classified),
            AttachmentOutcome::Skipped { .. } => None,
        })
    }
}

/// Finished request: the output archive plus what went into it.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessedArchive {
    pub request_id: Uuid,
    /// Name the upload was declared with.
    pub source_name: String,
    /// RFC 3339 timestamp of when the request was received.
    pub started_at: String,
    /// Suggested download filename.
    pub download_name: String,
    pub archive_size: u64,
    pub archive_sha256: String,
    pub report: ProcessReport,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}
