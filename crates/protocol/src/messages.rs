use serde::{Deserialize, Serialize};

use crate::constants::Direction;

// ---------------------------------------------------------------------------
// Client -> guest
// ---------------------------------------------------------------------------

/// Opening frame of every copy connection.
///
/// Exactly one request is sent per connection. It is the only control
/// frame without a `type` discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyRequest {
    pub direction: Direction,
    /// Absolute path inside the guest.
    pub guest_path: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_dir: bool,
    /// Permission bits for the created entry (0 = let the guest decide).
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub mode: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub follow_links: bool,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub uid: u32,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub gid: u32,
}

impl CopyRequest {
    /// Request to copy a single entry into the guest.
    pub fn to_guest(guest_path: impl Into<String>) -> Self {
        Self {
            direction: Direction::To,
            guest_path: guest_path.into(),
            is_dir: false,
            mode: 0,
            follow_links: false,
            uid: 0,
            gid: 0,
        }
    }

    /// Request to stream an entry (file or tree) out of the guest.
    pub fn from_guest(guest_path: impl Into<String>, follow_links: bool) -> Self {
        Self {
            direction: Direction::From,
            follow_links,
            ..Self::to_guest(guest_path)
        }
    }
}

// ---------------------------------------------------------------------------
// Guest -> client
// ---------------------------------------------------------------------------

/// Kind of filesystem entry described by a [`FileHeader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// Describes the next entry streamed out of the guest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileHeader {
    /// Path relative to the requested source; untrusted.
    pub path: String,
    pub mode: u32,
    pub is_dir: bool,
    pub is_symlink: bool,
    /// Symlink target; untrusted. Empty unless `is_symlink`.
    pub link_target: String,
    pub size: i64,
    /// Modification time in unix seconds (0 = unknown).
    pub mtime: i64,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub uid: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub gid: u32,
}

impl FileHeader {
    /// Returns the entry kind. Directory wins if both flags are set.
    pub fn kind(&self) -> EntryKind {
        if self.is_dir {
            EntryKind::Directory
        } else if self.is_symlink {
            EntryKind::Symlink
        } else {
            EntryKind::File
        }
    }
}

// ---------------------------------------------------------------------------
// Both directions
// ---------------------------------------------------------------------------

/// Ends the current entry's payload, or the whole transfer if `is_final`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndMarker {
    #[serde(rename = "final", default, skip_serializing_if = "is_false")]
    pub is_final: bool,
}

/// Outcome of a guest-side write; terminates a `to` connection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CopyResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub bytes_written: i64,
}

/// Terminal failure reported by the guest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !v
}
