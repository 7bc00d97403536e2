//! A minimal guest-side copy endpoint on a local TCP port.
//!
//! Serves a scratch directory as the guest filesystem so both sessions
//! can be exercised against a real WebSocket.

use std::path::{Path, PathBuf};

use futures_util::{SinkExt, StreamExt};
use guestcp_protocol::{
    ControlMessage, CopyRequest, CopyResult, Direction, EntryKind, ErrorMessage, FileHeader, Frame,
};
use guestcp_transfer::{Walker, meta};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http;

pub(crate) struct GuestServer {
    pub base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for GuestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl GuestServer {
    /// Starts serving `root`, accepting only `Bearer {api_key}`.
    pub async fn start(root: PathBuf, api_key: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let expected = format!("Bearer {api_key}");

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, root.clone(), expected.clone()));
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            handle,
        }
    }
}

async fn serve(stream: TcpStream, root: PathBuf, expected: String) {
    let check = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let auth = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok());
        if auth != Some(expected.as_str()) {
            let reject = http::Response::builder()
                .status(401)
                .body(Some("unauthorized".to_string()))
                .unwrap();
            return Err(reject);
        }
        if !req.uri().path().ends_with("/cp") {
            let reject = http::Response::builder()
                .status(404)
                .body(Some("not found".to_string()))
                .unwrap();
            return Err(reject);
        }
        Ok(resp)
    };
    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, check).await else {
        return;
    };

    let Some(Ok(Message::Text(text))) = ws.next().await else {
        return;
    };
    let req = Frame::Text(text.as_str().to_owned()).to_request().unwrap();
    let target = guest_path(&root, &req.guest_path);

    match req.direction {
        Direction::To => receive_entry(&mut ws, &req, &target).await,
        Direction::From => send_tree(&mut ws, &target).await,
    }
    let _ = ws.close(None).await;
}

fn guest_path(root: &Path, guest: &str) -> PathBuf {
    root.join(guest.trim_start_matches('/'))
}

async fn send_control(ws: &mut WebSocketStream<TcpStream>, msg: ControlMessage) {
    let json = msg.encode().unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

async fn receive_entry(ws: &mut WebSocketStream<TcpStream>, req: &CopyRequest, target: &Path) {
    let mut content = Vec::new();
    while let Some(Ok(msg)) = ws.next().await {
        match msg {
            Message::Binary(data) => content.extend_from_slice(&data),
            Message::Text(_) => break,
            _ => {}
        }
    }

    let written = content.len() as i64;
    let outcome = if req.is_dir {
        std::fs::create_dir_all(target)
    } else {
        std::fs::write(target, &content)
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if outcome.is_ok() && req.mode != 0 {
            let _ = std::fs::set_permissions(target, std::fs::Permissions::from_mode(req.mode));
        }
    }
    let outcome = match outcome {
        Ok(()) if req.uid != 0 || req.gid != 0 => meta::set_ownership(target, req.uid, req.gid),
        other => other,
    };

    let msg = match outcome {
        Ok(()) => ControlMessage::Result(CopyResult {
            success: true,
            error: None,
            bytes_written: written,
        }),
        Err(e) => ControlMessage::Error(ErrorMessage {
            message: e.to_string(),
            path: Some(req.guest_path.clone()),
        }),
    };
    send_control(ws, msg).await;
}

fn header_for(path: &Path, relative: String, kind: EntryKind) -> FileHeader {
    let meta = std::fs::symlink_metadata(path).unwrap();
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let (uid, gid) = meta::ownership(&meta);
    FileHeader {
        path: relative,
        mode: meta::permission_bits(&meta),
        is_dir: kind == EntryKind::Directory,
        is_symlink: kind == EntryKind::Symlink,
        link_target: match kind {
            EntryKind::Symlink => std::fs::read_link(path)
                .unwrap()
                .to_string_lossy()
                .into_owned(),
            _ => String::new(),
        },
        size: if kind == EntryKind::File {
            meta.len() as i64
        } else {
            0
        },
        mtime,
        uid,
        gid,
    }
}

async fn send_file(ws: &mut WebSocketStream<TcpStream>, path: &Path, header: FileHeader) {
    let content = std::fs::read(path).unwrap();
    send_control(ws, ControlMessage::Header(header)).await;
    for chunk in content.chunks(4) {
        ws.send(Message::Binary(chunk.to_vec().into())).await.unwrap();
    }
    send_control(ws, ControlMessage::end()).await;
}

async fn send_tree(ws: &mut WebSocketStream<TcpStream>, target: &Path) {
    let Ok(meta) = std::fs::metadata(target) else {
        send_control(
            ws,
            ControlMessage::Error(ErrorMessage {
                message: "no such file or directory".into(),
                path: Some(target.display().to_string()),
            }),
        )
        .await;
        return;
    };
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !meta.is_dir() {
        let header = header_for(target, name, EntryKind::File);
        send_file(ws, target, header).await;
        send_control(ws, ControlMessage::end_final()).await;
        return;
    }

    send_control(
        ws,
        ControlMessage::Header(header_for(target, name.clone(), EntryKind::Directory)),
    )
    .await;
    for entry in Walker::new(target, false).unwrap() {
        let entry = entry.unwrap();
        let relative = format!("{name}/{}", entry.relative);
        let header = header_for(&entry.path, relative, entry.kind);
        match entry.kind {
            EntryKind::File => send_file(ws, &entry.path, header).await,
            _ => send_control(ws, ControlMessage::Header(header)).await,
        }
    }
    send_control(ws, ControlMessage::end_final()).await;
}
