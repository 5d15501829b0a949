// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! One upload request, end to end.
//!
//! `Received → Extracting → Validating → Processing → Packing → Ready`, with
//! any failure ending in `Failed`. There are no retries within a request. The
//! working directory lives exactly as long as [`run`] and is removed on every
//! exit path.

use std::fmt;
use std::time::Instant;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::logic::extract::{attachments_dir, extract};
use crate::logic::pack::{DOWNLOAD_NAME, pack_with_level};
use crate::logic::process::{ProcessOptions, process_with};
use crate::logic::workspace::Workspace;
use crate::models::{ProcessedArchive, Upload};
use crate::utils::hash_bytes;

/// States of a single request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Received,
    Extracting,
    Validating,
    Processing,
    Packing,
    Ready,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Extracting => "extracting",
            Stage::Validating => "validating",
            Stage::Processing => "processing",
            Stage::Packing => "packing",
            Stage::Ready => "ready",
            Stage::Failed => "failed",
        }
    }

    /// `Ready` and `Failed` end a request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Ready | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current stage and the optional overall deadline.
struct Request {
    id: Uuid,
    stage: Stage,
    deadline: Option<Instant>,
}

impl Request {
    fn new(config: &PipelineConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Received,
            deadline: config.deadline().map(|budget| Instant::now() + budget),
        }
    }

    /// Move to `stage`. Work-bearing stages are refused once the deadline has passed.
    fn enter(&mut self, stage: Stage) -> Result<(), PipelineError> {
        if !stage.is_terminal() && self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
        {
            return Err(PipelineError::DeadlineExceeded(self.stage));
        }
        info!(from = %self.stage, to = %stage, "Stage transition");
        self.stage = stage;
        Ok(())
    }

    fn fail(&mut self, err: &PipelineError) {
        error!(
            from = %self.stage,
            to = %Stage::Failed,
            stage = %err.stage(),
            error = %err,
            "Request failed"
        );
        self.stage = Stage::Failed;
    }
}

/// Run the full unpack → classify → repack pipeline for one upload.
///
/// `None` or an empty upload fails immediately with
/// [`PipelineError::InputMissing`] before anything touches the filesystem.
///
/// # Errors
///
/// Any [`PipelineError`]; the caller can map it to a user-facing message with
/// [`PipelineError::user_message`]. No partial archive is returned on failure.
pub fn run(
    upload: Option<&Upload>,
    config: &PipelineConfig,
) -> Result<ProcessedArchive, PipelineError> {
    let mut request = Request::new(config);
    let span = info_span!(
        "request",
        id = %request.id,
        upload = upload.map(|u| u.declared_name.as_str()).unwrap_or("<none>")
    );
    let _guard = span.enter();

    let result = match upload {
        Some(upload) if !upload.is_empty() => run_stages(&mut request, upload, config),
        _ => Err(PipelineError::InputMissing),
    };

    match &result {
        Ok(archive) => info!(
            classified = archive.report.classified_count(),
            skipped = archive.report.skipped_count(),
            size = archive.archive_size,
            "Request ready"
        ),
        Err(err) => request.fail(err),
    }
    result
}

fn run_stages(
    request: &mut Request,
    upload: &Upload,
    config: &PipelineConfig,
) -> Result<ProcessedArchive, PipelineError> {
    let started_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    request.enter(Stage::Extracting)?;
    let workspace = Workspace::create(&config.work_root, &upload.declared_name).map_err(
        |source| PipelineError::Workspace {
            root: config.work_root.clone(),
            source,
        },
    )?;
    info!(workspace = ?workspace.path(), bytes = upload.bytes.len(), "Upload received");

    let extracted_root = workspace.extracted_dir();
    extract(&upload.bytes, &extracted_root)?;

    request.enter(Stage::Validating)?;
    let attachments = attachments_dir(&extracted_root)?;

    request.enter(Stage::Processing)?;
    let options = ProcessOptions {
        collisions: config.collisions,
        deadline: request.deadline,
    };
    let report = process_with(&attachments, &workspace.processed_dir(), &options)?;

    request.enter(Stage::Packing)?;
    let bytes = pack_with_level(&workspace.processed_dir(), config.compression_level)?;

    request.enter(Stage::Ready)?;
    let workspace_path = workspace.path().to_path_buf();
    if let Err(err) = workspace.close() {
        warn!(workspace = ?workspace_path, error = %err, "Failed to remove working directory");
    }

    Ok(ProcessedArchive {
        request_id: request.id,
        source_name: upload.declared_name.clone(),
        started_at,
        download_name: DOWNLOAD_NAME.to_string(),
        archive_size: bytes.len() as u64,
        archive_sha256: hash_bytes(&bytes),
        report,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::io::{Cursor, Read};

    use tempfile::TempDir;
    use zip::ZipArchive;

    use super::*;
    use crate::config::CollisionPolicy;
    use crate::error::ExtractionError;
    use crate::logic::extract::tests::{container, container_with_corrupt_payload};
    use crate::logic::signature::classify;
    use crate::models::{AttachmentOutcome, SkipReason};
    use crate::utils::hash_bytes;

    const PDF: &[u8] = b"%PDF-1.7\n1 0 obj";
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const MP4: &[u8] = b"\x00\x00\x00\x20ftypisom";

    fn config_in(root: &TempDir) -> PipelineConfig {
        PipelineConfig {
            work_root: root.path().to_path_buf(),
            ..Default::default()
        }
    }

    fn entries(bytes: &[u8]) -> BTreeMap<String, Vec<u8>> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut out = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).unwrap();
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).unwrap();
            out.insert(file.name().to_string(), buf);
        }
        out
    }

    fn is_empty_dir(root: &TempDir) -> bool {
        fs::read_dir(root.path()).unwrap().next().is_none()
    }

    #[test]
    fn run_keeps_classified_and_drops_unknown() {
        let root = TempDir::new().unwrap();
        let upload = Upload::new(
            "week.goodnotes",
            container(&[
                ("attachments/note1", PDF),
                ("attachments/note2", &[0xff, 0xff, 0xff, 0xff]),
            ]),
        );

        let archive = run(Some(&upload), &config_in(&root)).unwrap();

        let out = entries(&archive.bytes);
        assert_eq!(out.keys().collect::<Vec<_>>(), ["note1.pdf"]);
        assert_eq!(out["note1.pdf"], PDF);
        assert_eq!(archive.download_name, "processed_files.zip");
        assert!(matches!(
            &archive.report.outcomes[1],
            AttachmentOutcome::Skipped {
                reason: SkipReason::Unclassified { .. },
                ..
            }
        ));
        assert!(is_empty_dir(&root), "working directory must be removed");
    }

    // Every packed entry must be byte-identical to its source attachment and re-classify the same.
    #[test]
    fn run_output_round_trips_attachment_content() {
        let root = TempDir::new().unwrap();
        let upload = Upload::new(
            "mixed.goodnotes",
            container(&[
                ("attachments/a", PDF),
                ("attachments/b.jpeg", PNG),
                ("attachments/c", MP4),
                ("index.notes.pb", b"ignored"),
            ]),
        );

        let archive = run(Some(&upload), &config_in(&root)).unwrap();
        let out = entries(&archive.bytes);

        assert_eq!(out.len(), 3);
        assert_eq!(out["a.pdf"], PDF);
        assert_eq!(out["b.png"], PNG);
        assert_eq!(out["c.mp4"], MP4);
        for classified in archive.report.classified() {
            let content = &out[&classified.output_name];
            assert_eq!(hash_bytes(content), classified.sha256);
            assert_eq!(classify(content), Some(classified.tag));
        }
        assert_eq!(archive.archive_sha256, hash_bytes(&archive.bytes));
    }

    #[test]
    fn run_twice_yields_same_entries() {
        let root = TempDir::new().unwrap();
        let upload = Upload::new(
            "same.goodnotes",
            container(&[("attachments/x", PNG), ("attachments/y", PDF)]),
        );
        let config = config_in(&root);

        let first = run(Some(&upload), &config).unwrap();
        let second = run(Some(&upload), &config).unwrap();

        assert_eq!(entries(&first.bytes), entries(&second.bytes));
        assert_ne!(first.request_id, second.request_id);
    }

    #[test]
    fn run_without_attachments_dir_fails_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let upload = Upload::new("bad.goodnotes", container(&[("notes/page1", PDF)]));

        let err = run(Some(&upload), &config_in(&root)).unwrap_err();

        assert!(matches!(err, PipelineError::MissingAttachments(_)), "{err:?}");
        assert_eq!(err.stage(), Stage::Validating);
        assert!(is_empty_dir(&root));
    }

    #[test]
    fn run_with_no_classifiable_files_produces_empty_archive() {
        let root = TempDir::new().unwrap();
        let upload = Upload::new(
            "plain.goodnotes",
            container(&[("attachments/", b""), ("attachments/z", b"zzzz")]),
        );

        let archive = run(Some(&upload), &config_in(&root)).unwrap();

        assert!(entries(&archive.bytes).is_empty());
        assert_eq!(archive.report.skipped_count(), 1);
    }

    #[test]
    fn run_with_empty_attachments_dir_succeeds() {
        let root = TempDir::new().unwrap();
        let upload = Upload::new("empty.goodnotes", container(&[("attachments/", b"")]));

        let archive = run(Some(&upload), &config_in(&root)).unwrap();

        assert!(entries(&archive.bytes).is_empty());
        assert!(archive.report.outcomes.is_empty());
    }

    #[test]
    fn run_without_upload_reports_input_missing() {
        let root = TempDir::new().unwrap();
        let config = config_in(&root);

        let err = run(None, &config).unwrap_err();
        assert!(matches!(err, PipelineError::InputMissing));

        let err = run(Some(&Upload::new("x", Vec::new())), &config).unwrap_err();
        assert!(matches!(err, PipelineError::InputMissing));
        assert!(is_empty_dir(&root));
    }

    #[test]
    fn run_with_corrupt_container_fails_in_extraction() {
        let root = TempDir::new().unwrap();
        let upload = Upload::new("broken.goodnotes", b"PK\x03\x04 not really".to_vec());

        let err = run(Some(&upload), &config_in(&root)).unwrap_err();

        assert!(matches!(err, PipelineError::Extraction(_)), "{err:?}");
        assert_eq!(err.stage(), Stage::Extracting);
        assert!(is_empty_dir(&root));
    }

    #[test]
    fn run_with_damaged_entry_fails_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let upload = Upload::new(
            "damaged.goodnotes",
            container_with_corrupt_payload("attachments/note1"),
        );

        let err = run(Some(&upload), &config_in(&root)).unwrap_err();

        assert!(
            matches!(
                err,
                PipelineError::Extraction(ExtractionError::CorruptEntry { .. })
            ),
            "{err:?}"
        );
        assert_eq!(err.exit_code(), 1);
        assert!(is_empty_dir(&root));
    }

    #[test]
    fn run_overwrites_colliding_names_by_default() {
        let root = TempDir::new().unwrap();
        let later = b"\x89PNG later";
        let upload = Upload::new(
            "dupes.goodnotes",
            container(&[("attachments/a.one", PNG), ("attachments/a.two", later)]),
        );

        let archive = run(Some(&upload), &config_in(&root)).unwrap();
        let out = entries(&archive.bytes);

        assert_eq!(out.len(), 1);
        assert_eq!(out["a.png"], later);
        assert_eq!(archive.report.classified_count(), out.len());
        for classified in archive.report.classified() {
            let entry = &out[&classified.output_name];
            assert_eq!(hash_bytes(entry), classified.sha256, "{}", classified.source_name);
        }
        assert!(matches!(
            &archive.report.outcomes[0],
            AttachmentOutcome::Skipped { source_name, reason: SkipReason::Overwritten { by } }
                if source_name == "a.one" && by == "a.two"
        ));
    }

    #[test]
    fn run_suffixes_colliding_names_when_configured() {
        let root = TempDir::new().unwrap();
        let upload = Upload::new(
            "dupes.goodnotes",
            container(&[("attachments/a.one", PNG), ("attachments/a.two", PNG)]),
        );
        let config = PipelineConfig {
            collisions: CollisionPolicy::Suffix,
            ..config_in(&root)
        };

        let archive = run(Some(&upload), &config).unwrap();

        let names: Vec<_> = entries(&archive.bytes).into_keys().collect();
        assert_eq!(names, ["a-1.png", "a.png"]);
    }

    // A request that finished packing is not thrown away for running late.
    #[test]
    fn request_enters_terminal_stage_after_deadline() {
        let mut request = Request::new(&PipelineConfig::default());
        request.stage = Stage::Packing;
        request.deadline = Some(Instant::now());

        assert!(matches!(
            request.enter(Stage::Processing),
            Err(PipelineError::DeadlineExceeded(Stage::Packing))
        ));
        request.enter(Stage::Ready).unwrap();
        assert_eq!(request.stage, Stage::Ready);
    }

    #[test]
    fn request_fail_records_failed_stage() {
        let mut request = Request::new(&PipelineConfig::default());
        request.enter(Stage::Extracting).unwrap();

        request.fail(&PipelineError::InputMissing);

        assert_eq!(request.stage, Stage::Failed);
        assert!(request.stage.is_terminal());
    }

    #[test]
    fn stage_terminal_states() {
        assert!(Stage::Ready.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Packing.is_terminal());
        assert_eq!(Stage::Validating.to_string(), "validating");
    }
}
