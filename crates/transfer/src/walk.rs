//! Depth-first source tree walker.
//!
//! Produces every descendant of a root directory in pre-order, siblings
//! sorted by name, with relative paths normalized to forward slashes
//! (the guest is always POSIX).

use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use guestcp_protocol::EntryKind;
use tracing::{debug, trace};

use crate::TransferError;
use crate::meta::permission_bits;

/// Canonical directories already descended during one walk.
///
/// Only consulted for symlinked directories, so a link back to an
/// ancestor (or to a tree already sent) is skipped instead of recursing.
#[derive(Debug, Default)]
pub struct VisitedSet {
    dirs: HashSet<PathBuf>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a canonical directory. Returns `false` if already present.
    pub fn insert(&mut self, canonical: PathBuf) -> bool {
        self.dirs.insert(canonical)
    }

    pub fn contains(&self, canonical: &Path) -> bool {
        self.dirs.contains(canonical)
    }
}

/// One entry produced by [`Walker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Local path (under the walk root, possibly through symlinks).
    pub path: PathBuf,
    /// Path relative to the walk root, `/`-separated.
    pub relative: String,
    /// Kind as it will be sent. Followed symlinks report their target's kind.
    pub kind: EntryKind,
    /// Permission bits to send, or `None` to take them from the followed
    /// source at send time (always the case for symlinks).
    pub mode: Option<u32>,
}

/// Iterator over the descendants of a directory.
///
/// With `follow_links`, symlinks are resolved: broken links are skipped,
/// links to directories are descended unless their canonical target was
/// already visited. Without it, symlinks are opaque leaves.
pub struct Walker {
    root: PathBuf,
    follow_links: bool,
    visited: VisitedSet,
    stack: Vec<std::vec::IntoIter<PathBuf>>,
    /// Directory yielded last, read on the following `next()`.
    pending: Option<PathBuf>,
}

impl Walker {
    /// Starts a walk below `root`. The root itself is not yielded.
    pub fn new(root: &Path, follow_links: bool) -> Result<Self, TransferError> {
        let mut walker = Self {
            root: root.to_path_buf(),
            follow_links,
            visited: VisitedSet::new(),
            stack: Vec::new(),
            pending: None,
        };
        walker.mark_visited(root);
        walker.push_dir(root)?;
        Ok(walker)
    }

    /// Directories recorded so far.
    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    fn mark_visited(&mut self, dir: &Path) {
        if !self.follow_links {
            return;
        }
        if let Ok(canonical) = std::fs::canonicalize(dir) {
            self.visited.insert(canonical);
        }
    }

    fn push_dir(&mut self, dir: &Path) -> Result<(), TransferError> {
        let read = std::fs::read_dir(dir).map_err(|e| TransferError::io("read dir", dir, e))?;
        let mut children = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| TransferError::io("read dir", dir, e))?;
            children.push(entry.path());
        }
        children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        self.stack.push(children.into_iter());
        Ok(())
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn entry(&self, path: PathBuf, kind: EntryKind, mode: Option<u32>) -> WalkEntry {
        let relative = self.relative(&path);
        WalkEntry {
            path,
            relative,
            kind,
            mode,
        }
    }

    /// Classifies one path. `Ok(None)` means skip it. Directories are
    /// read lazily, after their own entry has been handed out.
    fn visit(&mut self, path: PathBuf) -> Result<Option<WalkEntry>, TransferError> {
        let lmeta = std::fs::symlink_metadata(&path)
            .map_err(|e| TransferError::io("stat", &path, e))?;

        if lmeta.file_type().is_symlink() {
            return self.visit_symlink(path);
        }

        let mode = Some(permission_bits(&lmeta));
        if lmeta.is_dir() {
            self.mark_visited(&path);
            self.pending = Some(path.clone());
            return Ok(Some(self.entry(path, EntryKind::Directory, mode)));
        }
        Ok(Some(self.entry(path, EntryKind::File, mode)))
    }

    fn visit_symlink(&mut self, path: PathBuf) -> Result<Option<WalkEntry>, TransferError> {
        if !self.follow_links {
            return Ok(Some(self.entry(path, EntryKind::Symlink, None)));
        }

        let Some((canonical, target)) = resolve_link(&path) else {
            debug!(path = %path.display(), "skipping broken symlink");
            return Ok(None);
        };

        if !target.is_dir() {
            return Ok(Some(self.entry(path, EntryKind::File, None)));
        }

        if !self.visited.insert(canonical) {
            debug!(path = %path.display(), "skipping symlink cycle");
            return Ok(None);
        }
        self.pending = Some(path.clone());
        Ok(Some(self.entry(path, EntryKind::Directory, None)))
    }
}

fn resolve_link(path: &Path) -> Option<(PathBuf, Metadata)> {
    let canonical = std::fs::canonicalize(path).ok()?;
    let target = std::fs::metadata(&canonical).ok()?;
    Some((canonical, target))
}

impl Iterator for Walker {
    type Item = Result<WalkEntry, TransferError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(dir) = self.pending.take() {
            if let Err(e) = self.push_dir(&dir) {
                self.stack.clear();
                return Some(Err(e));
            }
        }
        loop {
            let top = self.stack.last_mut()?;
            let Some(path) = top.next() else {
                self.stack.pop();
                continue;
            };
            match self.visit(path) {
                Ok(Some(entry)) => {
                    trace!(path = %entry.relative, kind = ?entry.kind, "walk entry");
                    return Some(Ok(entry));
                }
                Ok(None) => continue,
                Err(e) => {
                    // Abort the walk after the first error.
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}
