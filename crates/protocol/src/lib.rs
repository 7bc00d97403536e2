//! Wire protocol for the guest copy endpoint.
//!
//! One WebSocket connection carries an opening [`CopyRequest`] followed by
//! JSON control frames ([`ControlMessage`]) interleaved with raw binary
//! payload frames.

pub mod constants;
pub mod envelope;
pub mod messages;

pub use constants::{DEFAULT_CHUNK_SIZE, Direction, MessageType};
pub use envelope::{ControlMessage, Frame};
pub use messages::{CopyRequest, CopyResult, EndMarker, EntryKind, ErrorMessage, FileHeader};

/// Errors produced while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed control frame: {0}")]
    Malformed(serde_json::Error),

    #[error("control frame has no type")]
    MissingType,

    #[error("unknown control frame type: {0}")]
    UnknownType(String),

    #[error("invalid {} frame: {source}", .msg_type.as_str())]
    InvalidBody {
        msg_type: MessageType,
        source: serde_json::Error,
    },

    #[error("unexpected binary frame ({0} bytes)")]
    UnexpectedBinary(usize),

    #[error("unexpected {} frame, expected {expected}", .got.as_str())]
    Unexpected {
        expected: &'static str,
        got: MessageType,
    },
}
