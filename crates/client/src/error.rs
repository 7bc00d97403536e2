//! Copy error types.

use std::path::PathBuf;

use guestcp_protocol::ProtocolError;
use guestcp_transfer::TransferError;

/// Errors produced by a copy operation. All are terminal for the call.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("websocket connect failed: {0}")]
    ConnectFailed(String),

    #[error("websocket connect failed (HTTP {status}): {body}")]
    UpgradeRejected { status: u16, body: String },

    #[error("websocket error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid path from server: {path}: {reason}")]
    PathTraversal { path: String, reason: &'static str },

    #[error("copy stream ended without completion marker")]
    IncompleteTransfer,

    #[error("copy failed: {message}{}", at_path(.path))]
    Remote {
        message: String,
        path: Option<String>,
    },

    #[error("{context} {}: {source}", .path.display())]
    LocalIo {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("cancelled")]
    Cancelled,
}

fn at_path(path: &Option<String>) -> String {
    match path {
        Some(p) => format!(" (at {p})"),
        None => String::new(),
    }
}

impl CopyError {
    pub(crate) fn remote(message: impl Into<String>, path: Option<String>) -> Self {
        CopyError::Remote {
            message: message.into(),
            path: path.filter(|p| !p.is_empty()),
        }
    }

    pub(crate) fn local(
        context: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        CopyError::LocalIo {
            context,
            path: path.into(),
            source,
        }
    }
}

impl From<TransferError> for CopyError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io {
                context,
                path,
                source,
            } => CopyError::LocalIo {
                context,
                path,
                source,
            },
            TransferError::PathTraversal { path, reason } => {
                CopyError::PathTraversal { path, reason }
            }
            TransferError::InvalidSymlinkTarget { target, reason } => CopyError::PathTraversal {
                path: target,
                reason,
            },
        }
    }
}
