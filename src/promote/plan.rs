//! Root-confined resolution of copy operations
//!
//! Every path of every operation is resolved before anything is copied,
//! so an escaping path aborts the attempt with the workspaces untouched.

use crate::error::{Error, Result};
use crate::types::CopyOperation;
use std::path::{Component, Path, PathBuf};

/// One resolved copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyStep {
    /// Operation display name
    pub name: String,
    /// Absolute source path inside the source environment root
    pub source: PathBuf,
    /// Absolute target path inside the target environment root
    pub target: PathBuf,
}

/// Ordered, fully resolved copy steps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyPlan {
    /// Steps in declared order
    pub steps: Vec<CopyStep>,
}

impl CopyPlan {
    /// Resolve `operations` against the two environment roots
    pub fn resolve(
        operations: &[CopyOperation],
        source_root: &Path,
        target_root: &Path,
    ) -> Result<Self> {
        let steps = operations
            .iter()
            .map(|op| {
                Ok(CopyStep {
                    name: op.name.clone(),
                    source: secure_join(source_root, &op.source)?,
                    target: secure_join(target_root, &op.target)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }
}

/// Join `relative` onto `root`, refusing results outside `root`
///
/// `..` is resolved lexically; a leading `/` is taken relative to `root`.
/// Existing symlinks along the way are followed and must also stay inside.
pub fn secure_join(root: &Path, relative: &str) -> Result<PathBuf> {
    let escape = || Error::PathEscape {
        root: root.to_path_buf(),
        path: relative.to_string(),
    };

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(escape());
                }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    let joined = parts.iter().fold(root.to_path_buf(), |acc, p| acc.join(p));
    if !links_stay_inside(root, &parts) {
        return Err(escape());
    }
    Ok(joined)
}

/// Follow existing prefixes of the joined path and make sure none leaves `root`
fn links_stay_inside(root: &Path, parts: &[&std::ffi::OsStr]) -> bool {
    let Ok(canonical_root) = root.canonicalize() else {
        // Nothing exists yet, so nothing can link out
        return true;
    };

    let mut current = root.to_path_buf();
    for part in parts {
        current.push(part);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => match current.canonicalize() {
                Ok(resolved) if resolved.starts_with(&canonical_root) => {}
                _ => return false,
            },
            Ok(_) => {}
            Err(_) => break,
        }
    }
    true
}
