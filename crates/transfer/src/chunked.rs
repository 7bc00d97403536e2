use std::path::{Path, PathBuf};

use guestcp_protocol::FileHeader;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::warn;

use crate::TransferError;
use crate::meta::{self, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a local file in bounded chunks for streaming.
///
/// Only one chunk is buffered at a time.
pub struct ChunkReader {
    file: tokio::fs::File,
    path: PathBuf,
    buf: Vec<u8>,
    offset: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading. A `chunk_size` of 0 uses
    /// [`guestcp_protocol::DEFAULT_CHUNK_SIZE`].
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| TransferError::io("open source", path, e))?;
        let chunk_size = if chunk_size == 0 {
            guestcp_protocol::DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Ok(Self {
            file,
            path: path.to_path_buf(),
            buf: vec![0u8; chunk_size],
            offset: 0,
        })
    }

    /// Reads the next chunk. Returns `None` at EOF.
    pub async fn next_chunk(&mut self) -> Result<Option<&[u8]>, TransferError> {
        let n = self
            .file
            .read(&mut self.buf)
            .await
            .map_err(|e| TransferError::io("read source", &self.path, e))?;
        if n == 0 {
            return Ok(None);
        }
        self.offset += n as u64;
        Ok(Some(&self.buf[..n]))
    }

    /// Bytes read so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

// ---------------------------------------------------------------------------
// EntryWriter
// ---------------------------------------------------------------------------

/// The single open file of a receive session.
///
/// Created from an already-validated target path and the header that
/// announced it; [`finish`](Self::finish) closes the handle and applies
/// the header's timestamp and (optionally) ownership.
pub struct EntryWriter {
    file: tokio::fs::File,
    path: PathBuf,
    header: FileHeader,
    written: u64,
}

impl EntryWriter {
    /// Creates (or truncates) `path` with the header's mode, creating
    /// parent directories as needed.
    pub async fn create(path: PathBuf, header: FileHeader) -> Result<Self, TransferError> {
        if let Some(parent) = path.parent() {
            meta::create_dir_all(parent, DEFAULT_DIR_MODE)
                .await
                .map_err(|e| TransferError::io("create parent dir", parent, e))?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(if header.mode == 0 {
            DEFAULT_FILE_MODE
        } else {
            header.mode
        });
        #[cfg(not(unix))]
        let _ = DEFAULT_FILE_MODE;

        let file = options
            .open(&path)
            .await
            .map_err(|e| TransferError::io("create file", &path, e))?;

        Ok(Self {
            file,
            path,
            header,
            written: 0,
        })
    }

    /// Appends payload bytes. Returns the cumulative byte count.
    pub async fn write(&mut self, data: &[u8]) -> Result<u64, TransferError> {
        self.file
            .write_all(data)
            .await
            .map_err(|e| TransferError::io("write", &self.path, e))?;
        self.written += data.len() as u64;
        Ok(self.written)
    }

    /// Flushes and closes the file without touching its metadata.
    pub async fn close(mut self) -> Result<(), TransferError> {
        self.file
            .flush()
            .await
            .map_err(|e| TransferError::io("close", &self.path, e))
    }

    /// Closes the file, then applies mtime (if known) and, in archive
    /// mode, ownership. Metadata failures are logged, not returned.
    pub async fn finish(mut self, archive: bool) -> Result<FileHeader, TransferError> {
        self.file
            .flush()
            .await
            .map_err(|e| TransferError::io("close", &self.path, e))?;
        drop(self.file);

        if self.header.mtime > 0 {
            if let Err(e) = meta::set_mtime(&self.path, self.header.mtime) {
                warn!(path = %self.path.display(), "failed to set mtime: {e}");
            }
        }
        if archive {
            if let Err(e) = meta::set_ownership(&self.path, self.header.uid, self.header.gid) {
                warn!(path = %self.path.display(), "failed to set ownership: {e}");
            }
        }
        Ok(self.header)
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }
}
