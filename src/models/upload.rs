// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Uploaded container as handed over by a transport.

/// A container archive blob plus the name the client declared for it.
///
/// The declared name is used for logging and working-directory naming only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    pub declared_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(declared_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            declared_name: declared_name.into(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
