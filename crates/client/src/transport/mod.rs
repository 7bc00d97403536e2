//! Framed duplex channels to the copy endpoint.
//!
//! Sessions only see [`Connector`] and [`Channel`]; the live WebSocket
//! implementation and the in-memory scripted one plug in behind them.

mod scripted;
mod ws;

use std::future::Future;
use std::pin::Pin;

use guestcp_protocol::Frame;

use crate::error::CopyError;

pub use scripted::{RecordedConnection, ScriptedConnector};
pub use ws::WsConnector;

/// Boxed future returned by transport trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opens channels to a named endpoint.
pub trait Connector: Send + Sync {
    /// Connects to `url`, sending `headers` with the upgrade request.
    fn connect<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<Box<dyn Channel>, CopyError>>;
}

/// One open duplex channel.
pub trait Channel: Send {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<(), CopyError>>;

    /// Receives the next data frame. `Ok(None)` means the peer closed.
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<Frame>, CopyError>>;

    /// Closes the channel. Errors are swallowed; the channel is gone
    /// either way.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}
