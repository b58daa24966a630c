//! `tiled`-backed providers for TMX maps and TSX tilesets.

use std::path::{Path, PathBuf};

use normalize_path::NormalizePath;

use crate::providers::SourceError;

pub mod tmx;
pub mod tsx;

/// Resolve a path referenced from a Tiled file.
///
/// Tiled stores references like `../tilesets/town.tsx` relative to the file that
/// contains them. Absolute paths are returned unchanged (normalized).
///
/// # Arguments
/// * `referencing_file` - The map or tileset file containing the reference
/// * `relative_path` - The path as stored in that file
pub fn resolve_relative_path(
    referencing_file: &Path,
    relative_path: &Path,
) -> Result<PathBuf, SourceError> {
    if relative_path.is_absolute() {
        return Ok(relative_path.normalize());
    }

    let parent = referencing_file.parent().ok_or_else(|| {
        SourceError::InvalidPath(format!(
            "No parent directory for file: {:?}",
            referencing_file
        ))
    })?;

    // Path::join does NOT normalize - it just concatenates
    Ok(parent.join(relative_path).normalize())
}
