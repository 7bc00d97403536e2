use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::MessageType;
use crate::messages::{CopyRequest, CopyResult, EndMarker, ErrorMessage, FileHeader};

/// A typed control frame.
///
/// Serialized as a flat JSON object with a `type` discriminant, e.g.
/// `{"type":"end","final":true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Header(FileHeader),
    End(EndMarker),
    Result(CopyResult),
    Error(ErrorMessage),
}

impl ControlMessage {
    /// Returns the discriminant of this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            ControlMessage::Header(_) => MessageType::Header,
            ControlMessage::End(_) => MessageType::End,
            ControlMessage::Result(_) => MessageType::Result,
            ControlMessage::Error(_) => MessageType::Error,
        }
    }

    /// End marker for a single entry.
    pub fn end() -> Self {
        ControlMessage::End(EndMarker { is_final: false })
    }

    /// End marker for the whole transfer.
    pub fn end_final() -> Self {
        ControlMessage::End(EndMarker { is_final: true })
    }

    /// Decodes a text frame.
    ///
    /// The `type` field is inspected first so that unknown message kinds
    /// are reported as such rather than as a generic shape mismatch.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(rename = "type", default)]
            msg_type: Option<String>,
        }

        let probe: Probe = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
        let name = probe.msg_type.ok_or(ProtocolError::MissingType)?;
        let msg_type =
            MessageType::from_wire(&name).ok_or_else(|| ProtocolError::UnknownType(name))?;

        let msg = match msg_type {
            MessageType::Header => ControlMessage::Header(decode_body(text, msg_type)?),
            MessageType::End => ControlMessage::End(decode_body(text, msg_type)?),
            MessageType::Result => ControlMessage::Result(decode_body(text, msg_type)?),
            MessageType::Error => ControlMessage::Error(decode_body(text, msg_type)?),
        };
        Ok(msg)
    }

    /// Encodes this message as JSON text.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Malformed)
    }
}

fn decode_body<T: for<'de> Deserialize<'de>>(
    text: &str,
    msg_type: MessageType,
) -> Result<T, ProtocolError> {
    serde_json::from_str(text).map_err(|source| ProtocolError::InvalidBody { msg_type, source })
}

/// One message on the copy channel.
///
/// Control messages travel as text; file content travels as raw binary
/// frames with no envelope. Channel closure is not a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Encodes the opening request of a connection.
    pub fn request(req: &CopyRequest) -> Result<Self, ProtocolError> {
        let json = serde_json::to_string(req).map_err(ProtocolError::Malformed)?;
        Ok(Frame::Text(json))
    }

    /// Encodes a control message.
    pub fn control(msg: &ControlMessage) -> Result<Self, ProtocolError> {
        Ok(Frame::Text(msg.encode()?))
    }

    /// Decodes the control message carried by a text frame.
    ///
    /// Binary frames are rejected.
    pub fn to_control(&self) -> Result<ControlMessage, ProtocolError> {
        match self {
            Frame::Text(text) => ControlMessage::decode(text),
            Frame::Binary(data) => Err(ProtocolError::UnexpectedBinary(data.len())),
        }
    }

    /// Decodes the opening request (server side, and tests).
    pub fn to_request(&self) -> Result<CopyRequest, ProtocolError> {
        match self {
            Frame::Text(text) => serde_json::from_str(text).map_err(ProtocolError::Malformed),
            Frame::Binary(data) => Err(ProtocolError::UnexpectedBinary(data.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_marker_wire_format() {
        assert_eq!(ControlMessage::end().encode().unwrap(), r#"{"type":"end"}"#);
        assert_eq!(
            ControlMessage::end_final().encode().unwrap(),
            r#"{"type":"end","final":true}"#
        );
    }

    #[test]
    fn decode_header() {
        let text = r#"{"type":"header","path":"sub/a.txt","mode":420,"is_dir":false,
            "is_symlink":false,"link_target":"","size":11,"mtime":1234567890}"#;
        let msg = ControlMessage::decode(text).unwrap();
        match msg {
            ControlMessage::Header(h) => {
                assert_eq!(h.path, "sub/a.txt");
                assert_eq!(h.mode, 0o644);
                assert_eq!(h.size, 11);
                assert_eq!(h.mtime, 1234567890);
            }
            other => panic!("expected header, got {other:?}"),
        }
    }

    #[test]
    fn decode_end_without_final() {
        let msg = ControlMessage::decode(r#"{"type":"end"}"#).unwrap();
        assert_eq!(msg, ControlMessage::end());
    }

    #[test]
    fn decode_error_with_path() {
        let msg =
            ControlMessage::decode(r#"{"type":"error","message":"denied","path":"/etc"}"#).unwrap();
        assert_eq!(
            msg,
            ControlMessage::Error(ErrorMessage {
                message: "denied".into(),
                path: Some("/etc".into()),
            })
        );
        assert_eq!(msg.message_type(), MessageType::Error);
    }

    #[test]
    fn decode_result() {
        let msg =
            ControlMessage::decode(r#"{"type":"result","success":false,"error":"disk full"}"#)
                .unwrap();
        match msg {
            ControlMessage::Result(r) => {
                assert!(!r.success);
                assert_eq!(r.error.as_deref(), Some("disk full"));
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = ControlMessage::decode(r#"{"type":"progress","bytes":10}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(ref t) if t == "progress"));
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = ControlMessage::decode(r#"{"success":true}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingType));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = ControlMessage::decode("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn bad_body_names_the_type() {
        // Error frames require a message.
        let err = ControlMessage::decode(r#"{"type":"error"}"#).unwrap_err();
        assert!(err.to_string().contains("error"));
        assert!(matches!(
            err,
            ProtocolError::InvalidBody {
                msg_type: MessageType::Error,
                ..
            }
        ));
    }

    #[test]
    fn binary_frame_is_not_control() {
        let err = Frame::Binary(vec![1, 2, 3]).to_control().unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedBinary(3)));
    }

    #[test]
    fn request_frame_roundtrip() {
        let req = CopyRequest::from_guest("/app", false);
        let frame = Frame::request(&req).unwrap();
        assert_eq!(frame.to_request().unwrap(), req);
    }
}
