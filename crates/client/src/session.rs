use std::future::Future;

use guestcp_protocol::{ControlMessage, CopyResult, Frame, ProtocolError};
use tokio_util::sync::CancellationToken;

use crate::error::CopyError;
use crate::transport::{Channel, Connector};

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, CopyError>>,
) -> Result<T, CopyError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CopyError::Cancelled),
        r = fut => r,
    }
}

/// Opens a channel, honoring cancellation.
pub(crate) async fn open(
    connector: &dyn Connector,
    url: &str,
    headers: &[(String, String)],
    cancel: &CancellationToken,
) -> Result<Box<dyn Channel>, CopyError> {
    cancellable(cancel, connector.connect(url, headers)).await
}

/// Sends a control message.
pub(crate) async fn send_control(
    channel: &mut dyn Channel,
    msg: &ControlMessage,
) -> Result<(), CopyError> {
    channel.send(Frame::control(msg)?).await
}

/// Waits for the single response that terminates a send-direction
/// connection.
pub(crate) async fn await_result(channel: &mut dyn Channel) -> Result<CopyResult, CopyError> {
    let Some(frame) = channel.recv().await? else {
        return Err(CopyError::IncompleteTransfer);
    };
    match frame.to_control()? {
        ControlMessage::Error(e) => Err(CopyError::remote(e.message, e.path)),
        ControlMessage::Result(r) if r.success => Ok(r),
        ControlMessage::Result(r) => Err(CopyError::remote(
            r.error.unwrap_or_else(|| "guest reported failure".into()),
            None,
        )),
        other => Err(ProtocolError::Unexpected {
            expected: "result",
            got: other.message_type(),
        }
        .into()),
    }
}
