//! Input enumeration: image listing, stride sampling, and transcript lookup.
//!
//! Only the top level of the input directory is scanned. Extension
//! matching is case-insensitive and results are sorted by file name so
//! that chunk contents are reproducible across runs.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};
use crate::models::InputItem;

/// List the files in `dir` whose extension is in `extensions`, sorted by name.
///
/// Returns [`PipelineError::SourceNotFound`] if `dir` is not an existing
/// directory. An empty result is not an error here.
pub fn scan_images(dir: &Path, extensions: &[String]) -> Result<Vec<InputItem>> {
    let files = list_matching(dir, extensions)?;
    Ok(files
        .into_iter()
        .map(|(name, path)| InputItem::new(name, path))
        .collect())
}

/// Keep the items at positions `0, skip, 2 * skip, ...`.
pub fn select_stride(items: &[InputItem], skip_frames: usize) -> Result<Vec<InputItem>> {
    if skip_frames == 0 {
        return Err(PipelineError::InvalidConfig(
            "skip_frames must be >= 1".to_string(),
        ));
    }
    Ok(items.iter().step_by(skip_frames).cloned().collect())
}

/// First file in `dir` (by name) with a transcript extension.
pub fn find_transcript(dir: &Path, extensions: &[String]) -> Result<Option<PathBuf>> {
    if extensions.is_empty() {
        return Ok(None);
    }
    let files = list_matching(dir, extensions)?;
    Ok(files.into_iter().next().map(|(_, path)| path))
}

/// Read the transcript next to the images, if one exists.
///
/// Lookup and read failures are logged and treated as "no transcript".
pub fn load_transcript(dir: &Path, extensions: &[String]) -> Option<String> {
    let path = match find_transcript(dir, extensions) {
        Ok(Some(path)) => path,
        Ok(None) => {
            tracing::info!(dir = %dir.display(), "no transcript file found");
            return None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "transcript lookup failed");
            return None;
        }
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            tracing::info!(transcript = %path.display(), "transcript loaded");
            Some(content)
        }
        Err(e) => {
            tracing::warn!(transcript = %path.display(), error = %e, "failed to read transcript");
            None
        }
    }
}

fn list_matching(dir: &Path, extensions: &[String]) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        return Err(PipelineError::SourceNotFound(dir.to_path_buf()));
    }

    let matcher = build_extension_set(extensions)?;
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if matcher.is_match(&name) {
            files.push((name, entry.path().to_path_buf()));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn build_extension_set(extensions: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        let ext = ext.trim_start_matches('.');
        let glob = GlobBuilder::new(&format!("*.{}", ext))
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map_err(|e| PipelineError::InvalidConfig(format!("bad extension '{}': {}", ext, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| PipelineError::InvalidConfig(e.to_string()))
}
