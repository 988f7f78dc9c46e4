//! Filesystem helpers for writing the output tree.
//!
//! Every output file is written to a hidden sibling and renamed into place,
//! so a concurrent reader sees either the previous or the new file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::BuildError;

/// Write `contents` to `path` atomically, creating parent directories.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{file_name}.turbines-tmp"));

    fs::write(&tmp, contents).map_err(|e| BuildError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(BuildError::io(path, e));
    }
    Ok(())
}

/// Collect files under `dir` recursively, as paths relative to `dir`.
///
/// Hidden entries are skipped; `skip_underscore` additionally skips
/// `_`-prefixed entries (partials and drafts). Output is sorted so builds are
/// deterministic. A missing `dir` yields an empty list.
pub(crate) fn list_files(dir: &Path, skip_underscore: bool) -> Result<Vec<PathBuf>, BuildError> {
    let mut files = Vec::new();
    if dir.is_dir() {
        collect(dir, Path::new(""), skip_underscore, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn collect(
    dir: &Path,
    rel: &Path,
    skip_underscore: bool,
    files: &mut Vec<PathBuf>,
) -> Result<(), BuildError> {
    let entries = fs::read_dir(dir).map_err(|e| BuildError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| BuildError::io(dir, e))?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with('.') || (skip_underscore && name_str.starts_with('_')) {
            continue;
        }

        let path = entry.path();
        let rel_path = rel.join(&name);
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        if is_dir {
            collect(&path, &rel_path, skip_underscore, files)?;
        } else {
            files.push(rel_path);
        }
    }

    Ok(())
}

/// Copy every file under `src` into `dst`, preserving structure.
///
/// Returns the number of files copied.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<usize, BuildError> {
    let files = list_files(src, false)?;
    for rel in &files {
        let from = src.join(rel);
        let bytes = fs::read(&from).map_err(|e| BuildError::io(&from, e))?;
        write_atomic(&dst.join(rel), &bytes)?;
    }
    Ok(files.len())
}
