//! Final report persistence and console preview.

use std::path::Path;

use crate::error::Result;
use crate::store::write_atomic;

/// Write the aggregator's text verbatim, replacing any previous report.
pub fn write_report(path: &Path, text: &str) -> Result<()> {
    write_atomic(path, text.as_bytes())?;
    tracing::info!(path = %path.display(), bytes = text.len(), "critique saved");
    Ok(())
}

/// Up to five non-empty lines from the top fifteen, plus whether more exist.
pub fn preview(text: &str) -> (Vec<&str>, bool) {
    let lines: Vec<&str> = text
        .lines()
        .take(15)
        .filter(|l| !l.trim().is_empty())
        .collect();
    let truncated = lines.len() > 5;
    (lines.into_iter().take(5).collect(), truncated)
}
