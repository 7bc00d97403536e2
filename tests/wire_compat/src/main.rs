fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use guestcp_protocol::{
        ControlMessage, CopyRequest, CopyResult, Direction, EndMarker, EntryKind, ErrorMessage,
        FileHeader, Frame,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture as raw text, exactly as the guest agent would send it.
    fn load_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
            .trim()
            .to_string()
    }

    /// Drops zero-valued fields.
    ///
    /// The guest agent decodes a missing field as its zero value, so
    /// `{"final":false}` and `{}` mean the same thing on the wire.
    fn strip_zero_values(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Object(map) => {
                let stripped: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .filter(|(_, v)| !is_zero(v))
                    .map(|(k, v)| (k.clone(), strip_zero_values(v)))
                    .collect();
                serde_json::Value::Object(stripped)
            }
            _ => v.clone(),
        }
    }

    fn is_zero(v: &serde_json::Value) -> bool {
        match v {
            serde_json::Value::Null => true,
            serde_json::Value::Bool(b) => !b,
            serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
            serde_json::Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Decodes a control fixture, re-encodes it, and checks that both
    /// sides carry the same non-zero fields.
    fn control_roundtrip(name: &str) -> ControlMessage {
        let text = load_fixture(name);
        let msg = ControlMessage::decode(&text)
            .unwrap_or_else(|e| panic!("failed to decode {name}: {e}"));
        let encoded = msg
            .encode()
            .unwrap_or_else(|e| panic!("failed to encode {name}: {e}"));

        let fixture: serde_json::Value = serde_json::from_str(&text).unwrap();
        let reencoded: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(
            strip_zero_values(&fixture),
            strip_zero_values(&reencoded),
            "roundtrip mismatch for {name}:\n  agent: {text}\n  Rust:  {encoded}"
        );
        msg
    }

    // --- Requests ---

    #[test]
    fn request_to_guest() {
        let text = load_fixture("request_to.json");
        let req = Frame::Text(text.clone()).to_request().unwrap();
        assert_eq!(
            req,
            CopyRequest {
                mode: 0o755,
                uid: 1000,
                gid: 1000,
                ..CopyRequest::to_guest("/app/bin/tool")
            }
        );

        let Frame::Text(encoded) = Frame::request(&req).unwrap() else {
            panic!("request must be a text frame");
        };
        let fixture: serde_json::Value = serde_json::from_str(&text).unwrap();
        let reencoded: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(fixture, reencoded);
    }

    #[test]
    fn request_from_guest() {
        let text = load_fixture("request_from.json");
        let req = Frame::Text(text).to_request().unwrap();
        assert_eq!(req.direction, Direction::From);
        assert_eq!(req, CopyRequest::from_guest("/var/log", true));
    }

    #[test]
    fn request_has_no_type_field() {
        let Frame::Text(encoded) = Frame::request(&CopyRequest::to_guest("/x")).unwrap() else {
            panic!("request must be a text frame");
        };
        let v: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert!(v.get("type").is_none());
    }

    // --- Headers ---

    #[test]
    fn header_for_file() {
        let ControlMessage::Header(h) = control_roundtrip("header_file.json") else {
            panic!("expected header");
        };
        assert_eq!(h.kind(), EntryKind::File);
        assert_eq!(h.path, "nested/app.log");
        assert_eq!(h.mode, 0o644);
        assert_eq!(h.size, 5);
        assert_eq!(h.mtime, 1_700_000_000);
    }

    #[test]
    fn header_for_root_directory_with_owner() {
        let ControlMessage::Header(h) = control_roundtrip("header_dir.json") else {
            panic!("expected header");
        };
        assert_eq!(h.kind(), EntryKind::Directory);
        assert!(h.path.is_empty());
        assert_eq!((h.uid, h.gid), (1000, 1000));
    }

    #[test]
    fn header_for_symlink() {
        let ControlMessage::Header(h) = control_roundtrip("header_symlink.json") else {
            panic!("expected header");
        };
        assert_eq!(
            h,
            FileHeader {
                path: "current".into(),
                mode: 0o777,
                is_symlink: true,
                link_target: "releases/v2".into(),
                size: 11,
                mtime: 1_700_000_000,
                ..FileHeader::default()
            }
        );
    }

    #[test]
    fn header_always_carries_agent_fields() {
        let encoded = ControlMessage::Header(FileHeader::default()).encode().unwrap();
        let v: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        for field in [
            "type",
            "path",
            "mode",
            "is_dir",
            "is_symlink",
            "link_target",
            "size",
            "mtime",
        ] {
            assert!(v.get(field).is_some(), "missing {field} in {encoded}");
        }
        assert!(v.get("uid").is_none());
        assert!(v.get("gid").is_none());
    }

    // --- End markers ---

    #[test]
    fn end_markers() {
        assert_eq!(
            control_roundtrip("end.json"),
            ControlMessage::End(EndMarker { is_final: false })
        );
        assert_eq!(control_roundtrip("end_final.json"), ControlMessage::end_final());
    }

    #[test]
    fn end_without_final_field() {
        assert_eq!(
            ControlMessage::decode(r#"{"type":"end"}"#).unwrap(),
            ControlMessage::end()
        );
    }

    // --- Results and errors ---

    #[test]
    fn result_success() {
        assert_eq!(
            control_roundtrip("result_ok.json"),
            ControlMessage::Result(CopyResult {
                success: true,
                error: None,
                bytes_written: 11,
            })
        );
    }

    #[test]
    fn result_failure() {
        assert_eq!(
            control_roundtrip("result_failed.json"),
            ControlMessage::Result(CopyResult {
                success: false,
                error: Some("disk full".into()),
                bytes_written: 0,
            })
        );
    }

    #[test]
    fn error_with_path() {
        assert_eq!(
            control_roundtrip("error.json"),
            ControlMessage::Error(ErrorMessage {
                message: "no such file or directory".into(),
                path: Some("/missing".into()),
            })
        );
    }

    #[test]
    fn every_fixture_decodes() {
        let mut count = 0;
        for entry in fs::read_dir(fixtures_dir()).unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            let text = load_fixture(&name);
            let decoded = if name.starts_with("request_") {
                Frame::Text(text).to_request().map(|_| ())
            } else {
                ControlMessage::decode(&text).map(|_| ())
            };
            assert!(decoded.is_ok(), "{name}: {decoded:?}");
            count += 1;
        }
        assert!(count >= 10, "expected all fixtures, found {count}");
    }
}
