// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Pipeline stages: extract, classify, process, pack.

pub mod extract;
pub mod pack;
pub mod pipeline;
pub mod process;
pub mod signature;
pub mod workspace;
