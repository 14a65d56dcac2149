// Transport seam between the command channel and the physical link
//
// The channel only needs an ordered, reliable `send(frame)`; inbound frames
// are pushed back through `CommandChannel::on_frame` by whoever owns the
// read side. `ChannelTransport` is the in-process implementation used by the
// CLI and the tests: outbound frames land on an mpsc receiver and replies
// are fed back through a reply pump task.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{log_device_error, DeviceError};

use super::channel::CommandChannel;

/// Outbound half of a duplex frame link
pub trait Transport: Send + Sync {
    /// Transmit one fixed-length frame; must preserve send order
    fn send(&self, frame: Vec<u8>) -> BoxFuture<'_, Result<(), DeviceError>>;
}

/// In-process transport backed by an unbounded mpsc queue
#[derive(Clone)]
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelTransport {
    /// Create the transport and the receiver that observes every sent frame
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (Self { outbound }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: Vec<u8>) -> BoxFuture<'_, Result<(), DeviceError>> {
        let result = self
            .outbound
            .send(frame)
            .map_err(|_| DeviceError::TransportDisconnected {
                reason: "outbound receiver dropped".to_string(),
            });
        futures::future::ready(result).boxed()
    }
}

/// Forward inbound frames into `channel` until `inbound` closes
///
/// Closing the inbound side is treated as a disconnect: every pending reply
/// slot fails in one wave.
pub fn spawn_reply_pump(
    channel: Arc<CommandChannel>,
    mut inbound: mpsc::UnboundedReceiver<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = inbound.recv().await {
            if let Err(err) = channel.on_frame(&frame) {
                log_device_error(&err, "reply_pump");
            }
        }
        log::info!("[ReplyPump] Inbound stream closed");
        channel.disconnect("inbound stream closed");
    })
}
