//! Guest → local copies.
//!
//! One connection carries the whole transfer: after the opening request
//! the guest streams `header`, binary payload and `end` frames per entry,
//! and finishes with `end(final)`. Every server-supplied path goes through
//! the path guard before it touches the local filesystem.

use std::path::{Path, PathBuf};

use guestcp_protocol::{
    ControlMessage, CopyRequest, EndMarker, EntryKind, FileHeader, Frame, ProtocolError,
};
use guestcp_transfer::meta::{self, DEFAULT_DIR_MODE};
use guestcp_transfer::{CopyCallbacks, EntryWriter, resolve_within, validate_symlink_target};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CpConfig, build_ws_url};
use crate::error::CopyError;
use crate::session;
use crate::transport::{Channel, Connector};

/// Options for [`copy_from_instance`].
#[derive(Debug)]
pub struct CpFromInstanceOptions {
    pub instance_id: String,
    /// Source path inside the guest.
    pub src_path: String,
    /// Local destination root. Every received entry lands beneath it.
    pub dst_path: PathBuf,
    pub follow_links: bool,
    /// Apply the guest's uid/gid to received entries.
    pub archive: bool,
    pub callbacks: CopyCallbacks,
}

impl CpFromInstanceOptions {
    pub fn new(
        instance_id: impl Into<String>,
        src_path: impl Into<String>,
        dst_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            src_path: src_path.into(),
            dst_path: dst_path.into(),
            follow_links: false,
            archive: false,
            callbacks: CopyCallbacks::default(),
        }
    }
}

/// Copies a file or directory tree out of a guest instance.
///
/// Succeeds only once the guest sends its final end marker; a stream
/// that closes earlier is reported as [`CopyError::IncompleteTransfer`].
pub async fn copy_from_instance(
    connector: &dyn Connector,
    config: &CpConfig,
    opts: &CpFromInstanceOptions,
    cancel: &CancellationToken,
) -> Result<(), CopyError> {
    let url = build_ws_url(&config.base_url, &opts.instance_id)?;
    info!(
        instance = %opts.instance_id,
        src = %opts.src_path,
        dst = %opts.dst_path.display(),
        "copying from instance"
    );

    let mut channel = session::open(connector, &url, &config.headers(), cancel).await?;
    let mut receiver = Receiver {
        opts,
        current: None,
        entries: 0,
    };
    let result = session::cancellable(cancel, receiver.run(channel.as_mut())).await;
    channel.close().await;
    receiver.discard().await;

    if result.is_ok() {
        info!(instance = %opts.instance_id, entries = receiver.entries, "copy complete");
    }
    result
}

struct Receiver<'a> {
    opts: &'a CpFromInstanceOptions,
    /// The file currently receiving payload, if any.
    current: Option<EntryWriter>,
    entries: usize,
}

impl Receiver<'_> {
    async fn run(&mut self, channel: &mut dyn Channel) -> Result<(), CopyError> {
        let req = CopyRequest::from_guest(&self.opts.src_path, self.opts.follow_links);
        channel.send(Frame::request(&req)?).await?;

        while let Some(frame) = channel.recv().await? {
            if let Frame::Binary(data) = &frame {
                self.on_data(data).await?;
                continue;
            }
            match frame.to_control()? {
                ControlMessage::Header(header) => self.on_header(header).await?,
                ControlMessage::End(end) => {
                    if self.on_end(end).await? {
                        return Ok(());
                    }
                }
                ControlMessage::Error(e) => return Err(CopyError::remote(e.message, e.path)),
                ControlMessage::Result(r) => {
                    if !r.success {
                        return Err(CopyError::remote(
                            r.error.unwrap_or_else(|| "guest reported failure".into()),
                            None,
                        ));
                    }
                }
            }
        }
        Err(CopyError::IncompleteTransfer)
    }

    async fn on_header(&mut self, header: FileHeader) -> Result<(), CopyError> {
        if let Some(prev) = self.current.take() {
            debug!(path = %prev.header().path, "closing entry without end marker");
            prev.close().await?;
        }

        let target = resolve_within(&self.opts.dst_path, &header.path)?;
        self.entries += 1;
        debug!(path = %header.path, kind = ?header.kind(), size = header.size, "receiving entry");

        match header.kind() {
            EntryKind::Directory => {
                meta::create_dir_all(&target, header.mode)
                    .await
                    .map_err(|e| CopyError::local("create directory", &target, e))?;
                if self.opts.archive {
                    if let Err(e) = meta::set_ownership(&target, header.uid, header.gid) {
                        warn!(path = %target.display(), "failed to set ownership: {e}");
                    }
                }
            }
            EntryKind::Symlink => {
                validate_symlink_target(&header.link_target)?;
                ensure_parent(&target).await?;
                meta::remove_existing(&target)
                    .await
                    .map_err(|e| CopyError::local("remove existing", &target, e))?;
                meta::create_symlink(&header.link_target, &target)
                    .await
                    .map_err(|e| CopyError::local("create symlink", &target, e))?;
                if self.opts.archive {
                    if let Err(e) = meta::set_link_ownership(&target, header.uid, header.gid) {
                        warn!(path = %target.display(), "failed to set symlink ownership: {e}");
                    }
                }
            }
            EntryKind::File => {
                let size = u64::try_from(header.size).unwrap_or(0);
                let path = header.path.clone();
                self.current = Some(EntryWriter::create(target, header).await?);
                self.opts.callbacks.entry_start(&path, size);
            }
        }
        Ok(())
    }

    async fn on_data(&mut self, data: &[u8]) -> Result<(), CopyError> {
        let Some(writer) = self.current.as_mut() else {
            return Err(ProtocolError::UnexpectedBinary(data.len()).into());
        };
        let total = writer.write(data).await?;
        self.opts.callbacks.progress(total);
        Ok(())
    }

    /// Returns `true` once the whole transfer is complete.
    async fn on_end(&mut self, end: EndMarker) -> Result<bool, CopyError> {
        if let Some(writer) = self.current.take() {
            let header = writer.finish(self.opts.archive).await?;
            self.opts.callbacks.entry_end(&header.path);
        }
        Ok(end.is_final)
    }

    /// Closes a file left open by a failed or cancelled transfer.
    async fn discard(&mut self) {
        if let Some(writer) = self.current.take() {
            if let Err(e) = writer.close().await {
                warn!("closing partial file: {e}");
            }
        }
    }
}

async fn ensure_parent(path: &Path) -> Result<(), CopyError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            meta::create_dir_all(parent, DEFAULT_DIR_MODE)
                .await
                .map_err(|e| CopyError::local("create parent dir", parent, e))
        }
        _ => Ok(()),
    }
}
