//! Local → guest copies.
//!
//! Every filesystem entry travels on its own connection: request, payload
//! (files only), end marker, then exactly one result or error frame.
//! Directories are announced first, then walked and sent entry by entry.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use guestcp_protocol::{ControlMessage, CopyRequest, Frame};
use guestcp_transfer::meta::{ownership, permission_bits};
use guestcp_transfer::{ChunkReader, CopyCallbacks, Walker};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{CpConfig, build_ws_url};
use crate::error::CopyError;
use crate::session;
use crate::transport::{Channel, Connector};

/// Options for [`copy_to_instance`].
#[derive(Debug)]
pub struct CpToInstanceOptions {
    pub instance_id: String,
    /// Local source file or directory.
    pub src_path: PathBuf,
    /// Destination path inside the guest.
    pub dst_path: String,
    /// Permission override for the top-level entry. `None` uses the
    /// source's own bits.
    pub mode: Option<u32>,
    /// Send local uid/gid so the guest can preserve ownership.
    pub archive: bool,
    pub follow_links: bool,
    /// Payload frame size. 0 uses [`guestcp_protocol::DEFAULT_CHUNK_SIZE`].
    pub chunk_size: usize,
    pub callbacks: CopyCallbacks,
}

impl CpToInstanceOptions {
    pub fn new(
        instance_id: impl Into<String>,
        src_path: impl Into<PathBuf>,
        dst_path: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            src_path: src_path.into(),
            dst_path: dst_path.into(),
            mode: None,
            archive: false,
            follow_links: false,
            chunk_size: 0,
            callbacks: CopyCallbacks::default(),
        }
    }
}

/// Copies a local file or directory tree into a guest instance.
///
/// Not atomic: on failure, entries already sent stay on the guest.
pub async fn copy_to_instance(
    connector: &dyn Connector,
    config: &CpConfig,
    opts: &CpToInstanceOptions,
    cancel: &CancellationToken,
) -> Result<(), CopyError> {
    let url = build_ws_url(&config.base_url, &opts.instance_id)?;
    info!(
        instance = %opts.instance_id,
        src = %opts.src_path.display(),
        dst = %opts.dst_path,
        "copying to instance"
    );

    let sender = Sender {
        connector,
        url,
        headers: config.headers(),
        opts,
        cancel,
    };

    let meta = stat(&opts.src_path)?;
    sender
        .send_entry(&opts.src_path, &opts.dst_path, opts.mode, &meta)
        .await?;
    if !meta.is_dir() {
        return Ok(());
    }

    let mut count = 1usize;
    for entry in Walker::new(&opts.src_path, opts.follow_links)? {
        let entry = entry?;
        if sender.cancel.is_cancelled() {
            return Err(CopyError::Cancelled);
        }
        let dst = guest_join(&opts.dst_path, &entry.relative);
        let meta = stat(&entry.path)?;
        sender.send_entry(&entry.path, &dst, entry.mode, &meta).await?;
        count += 1;
    }
    info!(instance = %opts.instance_id, entries = count, "directory copied");
    Ok(())
}

struct Sender<'a> {
    connector: &'a dyn Connector,
    url: String,
    headers: Vec<(String, String)>,
    opts: &'a CpToInstanceOptions,
    cancel: &'a CancellationToken,
}

impl Sender<'_> {
    /// Sends one entry on a fresh connection.
    ///
    /// `meta` is the followed metadata of `src`, so a symlink is sent as
    /// whatever it points to.
    async fn send_entry(
        &self,
        src: &Path,
        dst: &str,
        mode: Option<u32>,
        meta: &Metadata,
    ) -> Result<(), CopyError> {
        let mut req = CopyRequest::to_guest(dst);
        req.is_dir = meta.is_dir();
        req.mode = mode.unwrap_or_else(|| permission_bits(meta));
        req.follow_links = self.opts.follow_links;
        if self.opts.archive {
            (req.uid, req.gid) = ownership(meta);
        }
        debug!(
            src = %src.display(),
            dst,
            is_dir = req.is_dir,
            mode = req.mode,
            "sending entry"
        );

        let mut channel =
            session::open(self.connector, &self.url, &self.headers, self.cancel).await?;
        let result = session::cancellable(
            self.cancel,
            self.exchange(channel.as_mut(), src, &req, meta.len()),
        )
        .await;
        channel.close().await;
        result
    }

    async fn exchange(
        &self,
        channel: &mut dyn Channel,
        src: &Path,
        req: &CopyRequest,
        size: u64,
    ) -> Result<(), CopyError> {
        channel.send(Frame::request(req)?).await?;

        let label = src.display().to_string();
        if !req.is_dir {
            self.stream_file(channel, src, &label, size).await?;
        }

        session::send_control(channel, &ControlMessage::end()).await?;
        let result = session::await_result(channel).await?;
        debug!(dst = %req.guest_path, bytes_written = result.bytes_written, "entry acknowledged");

        if !req.is_dir {
            self.opts.callbacks.entry_end(&label);
        }
        Ok(())
    }

    async fn stream_file(
        &self,
        channel: &mut dyn Channel,
        src: &Path,
        label: &str,
        size: u64,
    ) -> Result<(), CopyError> {
        let mut reader = ChunkReader::open(src, self.opts.chunk_size).await?;
        self.opts.callbacks.entry_start(label, size);

        while let Some(chunk) = reader.next_chunk().await? {
            channel.send(Frame::Binary(chunk.to_vec())).await?;
            self.opts.callbacks.progress(reader.offset());
        }
        Ok(())
    }
}

fn stat(path: &Path) -> Result<Metadata, CopyError> {
    std::fs::metadata(path).map_err(|e| CopyError::local("stat source", path, e))
}

/// Joins guest paths POSIX-style regardless of the local platform.
fn guest_join(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string();
    }
    if base.is_empty() {
        return relative.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), relative)
}
