//! Local entry metadata: permissions, ownership, timestamps.
//!
//! Ownership and mode bits only exist on Unix; elsewhere the getters
//! report neutral values and the setters are no-ops.

use std::fs::Metadata;
use std::io;
use std::path::Path;

use filetime::FileTime;

/// Mode used for files whose header carries no permission bits.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Mode used for directories created implicitly or without permission bits.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Returns the permission bits (`rwx` for user/group/other).
#[cfg(unix)]
pub fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
pub fn permission_bits(meta: &Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, _) => DEFAULT_DIR_MODE,
        (false, true) => 0o444,
        (false, false) => DEFAULT_FILE_MODE,
    }
}

/// Returns `(uid, gid)` of the entry.
#[cfg(unix)]
pub fn ownership(meta: &Metadata) -> (u32, u32) {
    use std::os::unix::fs::MetadataExt;
    (meta.uid(), meta.gid())
}

#[cfg(not(unix))]
pub fn ownership(_meta: &Metadata) -> (u32, u32) {
    (0, 0)
}

/// Changes ownership, following symlinks.
#[cfg(unix)]
pub fn set_ownership(path: &Path, uid: u32, gid: u32) -> io::Result<()> {
    std::os::unix::fs::chown(path, Some(uid), Some(gid))
}

#[cfg(not(unix))]
pub fn set_ownership(_path: &Path, _uid: u32, _gid: u32) -> io::Result<()> {
    Ok(())
}

/// Changes ownership of a symlink itself.
#[cfg(unix)]
pub fn set_link_ownership(path: &Path, uid: u32, gid: u32) -> io::Result<()> {
    std::os::unix::fs::lchown(path, Some(uid), Some(gid))
}

#[cfg(not(unix))]
pub fn set_link_ownership(_path: &Path, _uid: u32, _gid: u32) -> io::Result<()> {
    Ok(())
}

/// Sets access and modification time to `unix_secs`.
pub fn set_mtime(path: &Path, unix_secs: i64) -> io::Result<()> {
    let t = FileTime::from_unix_time(unix_secs, 0);
    filetime::set_file_times(path, t, t)
}

/// Creates `path` and any missing parents. Newly created directories get
/// `mode` (or [`DEFAULT_DIR_MODE`] when zero), subject to the umask.
pub async fn create_dir_all(path: &Path, mode: u32) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(if mode == 0 { DEFAULT_DIR_MODE } else { mode });
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path).await
}

/// Creates a symlink at `link` pointing to `target`.
#[cfg(unix)]
pub async fn create_symlink(target: &str, link: &Path) -> io::Result<()> {
    tokio::fs::symlink(target, link).await
}

#[cfg(windows)]
pub async fn create_symlink(target: &str, link: &Path) -> io::Result<()> {
    tokio::fs::symlink_file(target.replace('/', "\\"), link).await
}

#[cfg(not(any(unix, windows)))]
pub async fn create_symlink(_target: &str, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

/// Removes whatever sits at `path` (file, symlink, or empty directory).
/// A missing entry is not an error.
pub async fn remove_existing(path: &Path) -> io::Result<()> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        tokio::fs::remove_dir(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}
