//! Copy executor
//!
//! Applies one resolved [`CopyStep`] to the target working tree. Content is
//! copied; links, special files and nested `.git` entries are not. Symlinks
//! already present in the target are replaced, never written through.

use crate::error::{Error, Result};
use crate::promote::plan::CopyStep;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Copy `step.source` onto `step.target`
///
/// Directories are merged recursively into the target directory. A file
/// copied onto an existing directory lands inside it under its own name.
/// Missing parent directories are created.
pub fn execute_step(step: &CopyStep) -> Result<()> {
    let meta = match fs::metadata(&step.source) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::SourceNotFound(step.source.clone()));
        }
        Err(e) => return Err(e.into()),
    };

    if meta.is_dir() {
        debug!(operation = %step.name, source = %step.source.display(), "Copying directory");
        copy_dir(&step.source, &step.target)
    } else if meta.is_file() {
        let target = if is_real_dir(&step.target)? {
            match step.source.file_name() {
                Some(name) => step.target.join(name),
                None => step.target.clone(),
            }
        } else {
            step.target.clone()
        };
        debug!(operation = %step.name, target = %target.display(), "Copying file");
        copy_file(&step.source, &target)
    } else {
        warn!(source = %step.source.display(), "Source is neither a file nor a directory, skipping");
        Ok(())
    }
}

/// Whether `path` is a directory itself, not a link to one
fn is_real_dir(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Remove a symlink occupying `path` so the write lands in the tree itself
fn unlink(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            warn!(path = %path.display(), "Replacing symlink in target");
            fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn copy_file(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    unlink(target)?;
    fs::copy(source, target)?;
    Ok(())
}

fn copy_dir(source: &Path, target: &Path) -> Result<()> {
    unlink(target)?;
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == ".git" {
            continue;
        }
        let from = entry.path();
        let to = target.join(&name);
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            copy_dir(&from, &to)?;
        } else if file_type.is_file() {
            unlink(&to)?;
            fs::copy(&from, &to)?;
        } else {
            warn!(path = %from.display(), "Skipping symlink or special file");
        }
    }
    Ok(())
}
