//! In-memory transport that replays canned responses.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use guestcp_protocol::Frame;

use super::{BoxFuture, Channel, Connector};
use crate::error::CopyError;

/// What one scripted connection saw.
#[derive(Debug, Clone, Default)]
pub struct RecordedConnection {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Frames written by the client, in order.
    pub written: Vec<Frame>,
    pub closed: bool,
}

#[derive(Default)]
struct ScriptState {
    scripts: VecDeque<Vec<Frame>>,
    reject: Option<(u16, String)>,
    connections: Vec<Arc<Mutex<RecordedConnection>>>,
}

/// Connector whose channels replay a fixed frame script.
///
/// Each successful `connect` consumes the next script pushed with
/// [`push_script`](Self::push_script); once the scripts run out, new
/// channels are closed immediately. Reads return the script in order
/// regardless of what was written, then report closure.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the frames returned by the next connection.
    pub fn push_script(&self, frames: Vec<Frame>) -> &Self {
        self.state.lock().unwrap().scripts.push_back(frames);
        self
    }

    /// Makes every following `connect` fail as a rejected upgrade.
    pub fn reject_upgrade(&self, status: u16, body: impl Into<String>) -> &Self {
        self.state.lock().unwrap().reject = Some((status, body.into()));
        self
    }

    /// Snapshot of every connection opened so far.
    pub fn connections(&self) -> Vec<RecordedConnection> {
        let state = self.state.lock().unwrap();
        state
            .connections
            .iter()
            .map(|c| c.lock().unwrap().clone())
            .collect()
    }

    /// Number of scripts not yet consumed.
    pub fn remaining_scripts(&self) -> usize {
        self.state.lock().unwrap().scripts.len()
    }
}

impl Connector for ScriptedConnector {
    fn connect<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<Box<dyn Channel>, CopyError>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if let Some((status, body)) = &state.reject {
                return Err(CopyError::UpgradeRejected {
                    status: *status,
                    body: body.clone(),
                });
            }

            let script = state.scripts.pop_front().unwrap_or_default();
            let record = Arc::new(Mutex::new(RecordedConnection {
                url: url.to_string(),
                headers: headers.to_vec(),
                ..RecordedConnection::default()
            }));
            state.connections.push(Arc::clone(&record));

            Ok(Box::new(ScriptedChannel {
                script: script.into(),
                record,
            }) as Box<dyn Channel>)
        })
    }
}

struct ScriptedChannel {
    script: VecDeque<Frame>,
    record: Arc<Mutex<RecordedConnection>>,
}

impl Channel for ScriptedChannel {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<(), CopyError>> {
        Box::pin(async move {
            let mut record = self.record.lock().unwrap();
            if record.closed {
                return Err(CopyError::Transport("send on closed channel".into()));
            }
            record.written.push(frame);
            Ok(())
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, Result<Option<Frame>, CopyError>> {
        Box::pin(async move { Ok(self.script.pop_front()) })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.record.lock().unwrap().closed = true;
        })
    }
}
