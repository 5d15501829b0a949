// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Filesystem-safe names derived from untrusted upload names.
//!
//! The declared name of an upload is only ever used for logging and for naming
//! the request's working directory, never for type decisions.

/// Name used when nothing usable survives sanitizing.
pub const FALLBACK_COMPONENT: &str = "upload";

/// Longest component we hand to the filesystem as a directory prefix.
const MAX_COMPONENT_LEN: usize = 64;

/// Produce a filesystem-safe path component.
///
/// # Steps
/// - Transliterate Unicode to ASCII with `deunicode` (e.g., "Å" → "A").
/// - Allow ASCII alphanumerics plus `-`, `_`, and `.`; treat other characters as `_`.
/// - Collapse runs of `_` and `.`; trim leading and trailing dots.
/// - Guard against reserved/empty names and clamp the length.
pub fn sanitize_component(value: &str) -> String {
    let transliterated = deunicode::deunicode(value);
    let mut out = String::with_capacity(transliterated.len());
    let mut last: Option<char> = None;

    for ch in transliterated.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
            ch
        } else {
            '_'
        };

        // Runs of separators collapse to one.
        if matches!(mapped, '_' | '.') && last == Some(mapped) {
            continue;
        }
        out.push(mapped);
        last = Some(mapped);
    }

    while let Some(pos) = out.find("_.") {
        out.remove(pos);
    }

    // A leading dot would hide the working directory on Unix.
    let trimmed = out.trim_matches(|c| c == '.' || c == ' ');
    let mut out: String = trimmed.chars().take(MAX_COMPONENT_LEN).collect();
    while out.ends_with('.') {
        out.pop();
    }

    if out.is_empty() || out.chars().all(|c| c == '_') {
        return FALLBACK_COMPONENT.to_string();
    }

    let (basename, ext) = match out.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base.to_string(), Some(ext.to_string())),
        _ => (out.clone(), None),
    };

    let upper = basename.to_ascii_uppercase();
    let is_reserved = matches!(upper.as_str(), "CON" | "PRN" | "AUX" | "NUL")
        || ((upper.starts_with("COM") || upper.starts_with("LPT"))
            && upper.len() == 4
            && upper.as_bytes()[3].is_ascii_digit()
            && upper.as_bytes()[3] != b'0');

    if is_reserved {
        let new_base = format!("{basename}_");
        out = match ext {
            Some(ext) => format!("{new_base}.{ext}"),
            None => new_base,
        };
    }

    out
}
