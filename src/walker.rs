//! # Directory Walker Module
//!
//! Recursive discovery of TIFF files under the input root, mirroring the
//! directory structure into the output root as it goes. One finite pass
//! over the tree as it exists at start time; traversal order is whatever
//! the filesystem gives us.

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One unit of work: a source TIFF and its destination JPEG path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Check if a path has a TIFF extension (case-insensitive)
pub fn is_tiff(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext_lower = ext.to_string_lossy().to_lowercase();
        matches!(ext_lower.as_str(), "tif" | "tiff")
    } else {
        false
    }
}

/// Enumerate all TIFF files under `input_root`, creating the mirrored
/// directory under `output_root` for every directory encountered.
///
/// The output file keeps the input's base name with the extension replaced
/// by `.jpg`, placed under the output directory that mirrors the input
/// file's relative directory.
pub fn walk(input_root: &Path, output_root: &Path) -> Result<Vec<ConversionJob>> {
    let mut jobs = Vec::new();

    for entry in WalkDir::new(input_root) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(input_root)
            .unwrap_or(entry.path());

        if entry.file_type().is_dir() {
            // Idempotent, recursive; also covers the output root itself
            std::fs::create_dir_all(output_root.join(relative))?;
        } else if entry.file_type().is_file() && is_tiff(entry.path()) {
            jobs.push(ConversionJob {
                input: entry.path().to_path_buf(),
                output: output_root.join(relative).with_extension("jpg"),
            });
        }
    }

    Ok(jobs)
}
