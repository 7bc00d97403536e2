use serde::{Deserialize, Serialize};

/// Default size of a streamed binary payload frame (32 KiB).
///
/// This is a client-side tuning knob, not a protocol requirement: the
/// peer accepts payload frames of any size up to [`WS_MAX_MESSAGE_SIZE`].
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Maximum WebSocket message size in bytes (64 MiB).
pub const WS_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Path segment under which guest instances are addressed.
pub const INSTANCES_SEGMENT: &str = "instances";

/// Final path segment of the copy endpoint: `/instances/{id}/cp`.
pub const CP_SEGMENT: &str = "cp";

/// Discriminant carried in the `type` field of every control frame
/// except the initial request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Header,
    End,
    Result,
    Error,
}

impl MessageType {
    /// Returns the wire name of this message type.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Header => "header",
            MessageType::End => "end",
            MessageType::Result => "result",
            MessageType::Error => "error",
        }
    }

    /// Parses a wire name. Returns `None` for unknown types.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "header" => Some(MessageType::Header),
            "end" => Some(MessageType::End),
            "result" => Some(MessageType::Result),
            "error" => Some(MessageType::Error),
            _ => None,
        }
    }
}

/// Transfer direction, relative to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local → guest.
    To,
    /// Guest → local.
    From,
}
