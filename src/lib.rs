// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Recover typed attachments from note container archives.
//!
//! A container is a renamed ZIP whose `attachments/` directory holds files
//! without usable extensions. [`logic::pipeline::run`] unpacks it, sniffs each
//! attachment's leading bytes, renames the recognized ones and packs them into
//! a fresh ZIP.

pub mod app;
pub mod config;
pub mod error;
pub mod logic;
pub mod models;
pub mod utils;

pub use config::{CollisionPolicy, PipelineConfig};
pub use error::{ExtractionError, PackError, PipelineError};
pub use logic::pipeline::{Stage, run};
pub use logic::signature::{FileTag, classify};
pub use models::{ProcessedArchive, Upload};
