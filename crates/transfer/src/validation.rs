use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::TransferError;

const ABSOLUTE: &str = "absolute paths not allowed";
const ESCAPES: &str = "path escapes destination";

/// A lexically cleaned path: `.` dropped, `..` folded into its parent.
///
/// `..` segments that cannot be folded are counted in `parents`; on an
/// absolute path they stop at the root, as with `/..`.
struct Cleaned<'a> {
    root: PathBuf,
    parents: usize,
    segments: Vec<&'a OsStr>,
}

impl<'a> Cleaned<'a> {
    fn new(path: &'a Path) -> Self {
        let mut root = PathBuf::new();
        let mut parents = 0;
        let mut segments = Vec::new();

        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => root.push(component.as_os_str()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if segments.pop().is_none() && root.as_os_str().is_empty() {
                        parents += 1;
                    }
                }
                Component::Normal(s) => segments.push(s),
            }
        }

        Self {
            root,
            parents,
            segments,
        }
    }

    fn is_absolute(&self) -> bool {
        !self.root.as_os_str().is_empty()
    }

    fn is_root(&self) -> bool {
        self.is_absolute() && self.segments.is_empty()
    }

    fn to_path(&self) -> PathBuf {
        let mut out = self.root.clone();
        for _ in 0..self.parents {
            out.push("..");
        }
        for s in &self.segments {
            out.push(s);
        }
        out
    }
}

/// Resolves a server-supplied relative path against a trusted base
/// directory.
///
/// The candidate is cleaned first, then rejected if it is absolute or
/// still begins with `..`. The cleaned candidate is joined onto the
/// (cleaned) base and the result must be the base itself or lie beneath
/// it; a base of `/` admits everything. Pure: the filesystem is never
/// consulted, so symlinks already on disk are not resolved.
pub fn resolve_within(base: &Path, candidate: &str) -> Result<PathBuf, TransferError> {
    let traversal = |reason| TransferError::PathTraversal {
        path: candidate.to_string(),
        reason,
    };

    let cleaned = Cleaned::new(Path::new(candidate));
    if cleaned.is_absolute() {
        return Err(traversal(ABSOLUTE));
    }
    if cleaned.parents > 0 {
        return Err(traversal(ESCAPES));
    }

    let base = Cleaned::new(base);
    let base_path = base.to_path();
    let mut resolved = base_path.clone();
    for s in &cleaned.segments {
        resolved.push(s);
    }

    // Re-check after joining.
    if !base.is_root() && !resolved.starts_with(&base_path) {
        return Err(traversal(ESCAPES));
    }

    Ok(resolved)
}

/// Validates a server-supplied symlink target.
///
/// Stricter than [`resolve_within`] and independent of where the link
/// itself lives: targets must be relative and must not begin with `..`
/// once cleaned.
pub fn validate_symlink_target(target: &str) -> Result<(), TransferError> {
    let invalid = |reason| TransferError::InvalidSymlinkTarget {
        target: target.to_string(),
        reason,
    };

    let cleaned = Cleaned::new(Path::new(target));
    if cleaned.is_absolute() {
        return Err(invalid(ABSOLUTE));
    }
    if cleaned.parents > 0 {
        return Err(invalid(ESCAPES));
    }
    Ok(())
}
