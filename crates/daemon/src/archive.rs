//! Archiver module for moving finished originals out of the input directory.
//!
//! A rename is tried first; when that fails (different filesystem, some
//! network mounts) the file is copied and the original removed.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while archiving an input file.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The input path has no final component to reuse in the archive.
    #[error("Input path has no file name: {0}")]
    NoFileName(PathBuf),

    /// Neither rename nor copy could place the file in the archive.
    #[error("Failed to move file into archive: {0}")]
    MoveFailed(std::io::Error),

    /// The copy succeeded but the original could not be removed.
    #[error("Failed to remove original after copying to archive: {0}")]
    RemoveFailed(std::io::Error),
}

/// Destination of `input` inside `archive_dir`, keeping the original file name.
///
/// # Example
///
/// ```
/// use std::path::{Path, PathBuf};
/// use batch_compressor::archive::archive_path;
///
/// let dest = archive_path(Path::new("input/movie.mp4"), Path::new("archive"));
/// assert_eq!(dest, Some(PathBuf::from("archive/movie.mp4")));
/// ```
pub fn archive_path(input: &Path, archive_dir: &Path) -> Option<PathBuf> {
    input.file_name().map(|name| archive_dir.join(name))
}

/// Move `input` into `archive_dir`.
///
/// On failure the original stays where it was; a copy left in the archive by a
/// failed fallback is removed again.
///
/// # Returns
///
/// * `Ok(PathBuf)` with the archived location
/// * `Err(ArchiveError)` if the file could not be moved
pub fn move_to_archive(input: &Path, archive_dir: &Path) -> Result<PathBuf, ArchiveError> {
    let dest =
        archive_path(input, archive_dir).ok_or_else(|| ArchiveError::NoFileName(input.to_path_buf()))?;

    if fs::rename(input, &dest).is_ok() {
        return Ok(dest);
    }

    copy_then_remove(input, &dest)?;
    Ok(dest)
}

/// Fallback move for when a rename is not possible: copy `input` to `dest`,
/// then delete `input`. If the delete fails the copy at `dest` is removed so
/// the file exists in exactly one place.
pub fn copy_then_remove(input: &Path, dest: &Path) -> Result<(), ArchiveError> {
    fs::copy(input, dest).map_err(ArchiveError::MoveFailed)?;
    if let Err(e) = fs::remove_file(input) {
        let _ = fs::remove_file(dest);
        return Err(ArchiveError::RemoveFailed(e));
    }
    Ok(())
}
