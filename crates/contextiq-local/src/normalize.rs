//! Minimal, deterministic text normalization shared by every acquisition path.

use contextiq_core::{Error, Result};

/// Normalize Windows/classic-mac line endings to `\n`.
pub fn normalize_line_endings(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

/// Collapse every whitespace run to a single space and trim.
///
/// This is the final step of web reduction: the output is a single line.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// File/text normal form: line endings normalized, whitespace runs collapsed
/// within each line, blank lines dropped, output trimmed.
///
/// Unlike [`collapse_ws`] this keeps line structure, so page breaks written by
/// the PDF extractor (pages joined with newlines) survive normalization.
pub fn clean_text(s: &str) -> String {
    normalize_line_endings(s)
        .lines()
        .map(collapse_ws)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bound a buffer by character count for use as conversational context.
pub fn context_preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}

/// Reject text below the minimum floor for its source kind.
///
/// Exactly `min` characters is accepted; one below is an error. Callers must
/// normalize first so whitespace-only padding cannot sneak past the floor.
pub fn ensure_min_chars(s: &str, min: usize) -> Result<()> {
    let got = s.chars().count();
    if got < min {
        return Err(Error::ContentTooShort { got, min });
    }
    Ok(())
}
