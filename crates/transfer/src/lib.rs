//! Local side of guest copies.
//!
//! Everything here touches (or guards) the local filesystem: resolving
//! server-supplied paths, walking source trees, reading and writing file
//! content in chunks, and applying entry metadata.

mod chunked;
pub mod meta;
mod progress;
mod validation;
mod walk;

use std::path::{Path, PathBuf};

pub use chunked::{ChunkReader, EntryWriter};
pub use progress::{
    CopyCallbacks, EntryEndCallback, EntryStartCallback, ProgressCallback, SpeedCalculator,
};
pub use validation::{resolve_within, validate_symlink_target};
pub use walk::{VisitedSet, WalkEntry, Walker};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("{context} {}: {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid path {path}: {reason}")]
    PathTraversal { path: String, reason: &'static str },

    #[error("invalid symlink target {target}: {reason}")]
    InvalidSymlinkTarget { target: String, reason: &'static str },
}

impl TransferError {
    pub(crate) fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        TransferError::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }
}
