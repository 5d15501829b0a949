// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Batch runner: each input container is an independent request.
//!
//! Jobs are fanned out to a small pool of worker threads over
//! `crossbeam-channel`; each worker runs the pipeline for one input at a time
//! and reports back. Within a request everything stays sequential.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::logic::pack::DOWNLOAD_NAME;
use crate::logic::pipeline;
use crate::logic::signature::{FileTag, MAGIC_LEN, classify};
use crate::models::{ProcessedArchive, Upload};
use crate::utils::sanitize_component;

/// One input container and where its output archive goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Finished job as reported back by a worker.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: Job,
    pub result: Result<ProcessedArchive>,
}

impl JobOutcome {
    /// Exit code for this job: 0 on success, otherwise the pipeline's code.
    pub fn exit_code(&self) -> u8 {
        match &self.result {
            Ok(_) => 0,
            Err(err) => err
                .downcast_ref::<PipelineError>()
                .map(PipelineError::exit_code)
                .unwrap_or(1),
        }
    }

    /// Message safe to show an end user.
    pub fn user_message(&self) -> String {
        match &self.result {
            Ok(archive) => format!(
                "{} attachment(s) recovered into {}",
                archive.report.classified_count(),
                self.job.output.display()
            ),
            Err(err) => err
                .downcast_ref::<PipelineError>()
                .map(PipelineError::user_message)
                .unwrap_or(crate::error::MSG_PROCESSING_FAILED)
                .to_string(),
        }
    }
}

/// Assign output paths under `output_dir`.
///
/// A single input writes `processed_files.zip`; several inputs are prefixed
/// with their sanitized file stem, disambiguated with a counter when stems repeat.
pub fn plan_jobs(inputs: &[PathBuf], output_dir: &Path) -> Vec<Job> {
    if let [input] = inputs {
        return vec![Job {
            input: input.clone(),
            output: output_dir.join(DOWNLOAD_NAME),
        }];
    }

    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let stem = sanitize_component(
                &input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            let mut name = format!("{stem}_{DOWNLOAD_NAME}");
            let mut n = 1;
            while !taken.insert(name.clone()) {
                name = format!("{stem}-{n}_{DOWNLOAD_NAME}");
                n += 1;
            }
            Job {
                input: input.clone(),
                output: output_dir.join(name),
            }
        })
        .collect()
}

/// Read the input, run the pipeline and persist the archive atomically.
///
/// The returned archive keeps its metadata and report; its `bytes` are
/// released once they are on disk at `job.output`.
pub fn run_job(job: &Job, config: &PipelineConfig) -> Result<ProcessedArchive> {
    let upload = match fs::read(&job.input) {
        Ok(bytes) => Some(Upload::new(declared_name(&job.input), bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read input {:?}", job.input));
        }
    };

    let mut archive = pipeline::run(upload.as_ref(), config)?;
    persist(&job.output, &std::mem::take(&mut archive.bytes))?;
    info!(output = ?job.output, size = archive.archive_size, "Created zip file");
    Ok(archive)
}

/// Run `jobs` on up to `workers` threads; outcomes come back in job order.
pub fn run_batch(jobs: Vec<Job>, config: &PipelineConfig, workers: usize) -> Vec<JobOutcome> {
    let total = jobs.len();
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, Job)>();
    let (done_tx, done_rx) = crossbeam_channel::unbounded::<(usize, JobOutcome)>();

    for indexed in jobs.into_iter().enumerate() {
        // Receiver is alive until the scope below ends.
        let _ = job_tx.send(indexed);
    }
    drop(job_tx);

    let threads = workers.clamp(1, total.max(1));
    std::thread::scope(|scope| {
        for _ in 0..threads {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                for (index, job) in job_rx.iter() {
                    debug!(input = ?job.input, "Worker picked up job");
                    let result = run_job(&job, config);
                    let _ = done_tx.send((index, JobOutcome { job, result }));
                }
            });
        }
    });
    drop(done_tx);

    let mut outcomes: Vec<_> = done_rx.iter().collect();
    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Classify a file on disk by its leading bytes.
pub fn sniff_file(path: &Path) -> Result<Option<FileTag>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut head = Vec::with_capacity(MAGIC_LEN);
    file.take(MAGIC_LEN as u64)
        .read_to_end(&mut head)
        .with_context(|| format!("Failed to read {:?}", path))?;
    Ok(classify(&head))
}

#[derive(Serialize)]
struct ReportEntry<'a> {
    input: &'a Path,
    output: &'a Path,
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive: Option<&'a ProcessedArchive>,
}

/// Write a JSON summary of `outcomes` to `path`.
pub fn write_report(path: &Path, outcomes: &[JobOutcome]) -> Result<()> {
    let entries: Vec<_> = outcomes
        .iter()
        .map(|outcome| ReportEntry {
            input: &outcome.job.input,
            output: &outcome.job.output,
            status: if outcome.result.is_ok() { "ready" } else { "failed" },
            message: outcome.user_message(),
            error: outcome.result.as_ref().err().map(|err| format!("{err:#}")),
            archive: outcome.result.as_ref().ok(),
        })
        .collect();

    let json = serde_json::to_vec_pretty(&entries)?;
    persist(path, &json)
}

fn declared_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
    tmp.write_all(bytes)
        .with_context(|| format!("Failed to write {:?}", path))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to move output into place at {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::logic::extract::tests::container;

    fn config_in(root: &TempDir) -> PipelineConfig {
        PipelineConfig {
            work_root: root.path().join("work"),
            ..Default::default()
        }
    }

    #[test]
    fn plan_jobs_uses_download_name_for_single_input() {
        let jobs = plan_jobs(&[PathBuf::from("in/week.goodnotes")], Path::new("out"));
        assert_eq!(jobs[0].output, PathBuf::from("out/processed_files.zip"));
    }

    #[test]
    fn plan_jobs_prefixes_and_disambiguates_multiple_inputs() {
        let inputs = [
            PathBuf::from("a/Week 1.goodnotes"),
            PathBuf::from("b/Week 1.goodnotes"),
            PathBuf::from("c/other.goodnotes"),
        ];
        let outputs: Vec<_> = plan_jobs(&inputs, Path::new("out"))
            .into_iter()
            .map(|job| job.output)
            .collect();

        assert_eq!(
            outputs,
            [
                PathBuf::from("out/Week_1_processed_files.zip"),
                PathBuf::from("out/Week_1-1_processed_files.zip"),
                PathBuf::from("out/other_processed_files.zip"),
            ]
        );
    }

    #[test]
    fn run_job_writes_output_archive() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("week.goodnotes");
        fs::write(&input, container(&[("attachments/n", b"%PDF-1.5")])).unwrap();
        let job = Job {
            input,
            output: tmp.path().join("out").join(DOWNLOAD_NAME),
        };

        let archive = run_job(&job, &config_in(&tmp)).unwrap();

        let on_disk = fs::read(&job.output).unwrap();
        assert_eq!(on_disk.len() as u64, archive.archive_size);
        assert_eq!(crate::utils::hash_bytes(&on_disk), archive.archive_sha256);
        assert!(archive.bytes.is_empty());
        assert_eq!(archive.report.classified_count(), 1);
        assert_eq!(archive.source_name, "week.goodnotes");
    }

    #[test]
    fn run_job_maps_missing_input_to_input_missing() {
        let tmp = TempDir::new().unwrap();
        let job = Job {
            input: tmp.path().join("absent.goodnotes"),
            output: tmp.path().join(DOWNLOAD_NAME),
        };

        let outcome = JobOutcome {
            result: run_job(&job, &config_in(&tmp)),
            job,
        };

        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(outcome.user_message(), crate::error::MSG_INPUT_MISSING);
        assert!(!outcome.job.output.exists());
    }

    #[test]
    fn run_batch_keeps_requests_independent() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.goodnotes");
        let bad = tmp.path().join("bad.goodnotes");
        fs::write(&good, container(&[("attachments/p", b"\x89PNG....")])).unwrap();
        fs::write(&bad, container(&[("pages/p", b"\x89PNG....")])).unwrap();
        let jobs = plan_jobs(&[good, bad], &tmp.path().join("out"));

        let outcomes = run_batch(jobs, &config_in(&tmp), 4);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].exit_code(), 0);
        assert_eq!(outcomes[1].exit_code(), 3);
        assert!(outcomes[0].job.output.exists());
        assert!(!outcomes[1].job.output.exists());
        // Outcomes keep the report, not the archive bytes.
        assert!(outcomes[0].result.as_ref().unwrap().bytes.is_empty());
        // Every per-request working directory is gone.
        assert_eq!(fs::read_dir(tmp.path().join("work")).unwrap().count(), 0);
    }

    #[test]
    fn sniff_file_reads_only_leading_bytes() {
        let tmp = TempDir::new().unwrap();
        let pdf = tmp.path().join("mystery");
        let short = tmp.path().join("short");
        fs::write(&pdf, b"%PDF-1.4 and a lot more").unwrap();
        fs::write(&short, b"%P").unwrap();

        assert_eq!(sniff_file(&pdf).unwrap(), Some(FileTag::Pdf));
        assert_eq!(sniff_file(&short).unwrap(), None);
        assert!(sniff_file(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn write_report_serializes_each_outcome() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("week.goodnotes");
        fs::write(&input, container(&[("attachments/n", b"%PDF-1.5")])).unwrap();
        let jobs = plan_jobs(&[input, tmp.path().join("missing.goodnotes")], tmp.path());
        let outcomes = run_batch(jobs, &config_in(&tmp), 1);
        let report_path = tmp.path().join("report.json");

        write_report(&report_path, &outcomes).unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(&report_path).unwrap()).unwrap();
        assert_eq!(json[0]["status"], "ready");
        assert_eq!(json[0]["archive"]["report"]["outcomes"][0]["output_name"], "n.pdf");
        assert_eq!(json[1]["status"], "failed");
        assert_eq!(json[1]["message"], crate::error::MSG_INPUT_MISSING);
        assert!(json[1].get("archive").is_none());
    }
}
