//! Integration tests for the framed command channel
//!
//! Drives `CommandChannel` through the in-process transport with a scripted
//! keyboard on the other end. Validates:
//! - FIFO reply correlation without request ids
//! - device error routing to the failed caller only
//! - disconnect as a single failure wave
//! - protocol violation poisoning and reinitialization
//! - oversized payload rejection before I/O
//! - reply alignment under concurrent callers on a transport that yields

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use keylight::config::ProtocolConfig;
use keylight::error::DeviceError;
use keylight::protocol::{
    spawn_reply_pump, ChannelTransport, Command, CommandChannel, FrameFormat, LightingDevice,
    StatusCode, Transport,
};
use tokio::sync::mpsc;

struct Harness {
    channel: Arc<CommandChannel>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

fn harness() -> Harness {
    let (transport, outbound) = ChannelTransport::new();
    let format = FrameFormat::from_config(&ProtocolConfig::default()).unwrap();
    Harness {
        channel: Arc::new(CommandChannel::new(format, Arc::new(transport))),
        outbound,
    }
}

fn reply(command: u8, status: StatusCode, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; 33];
    frame[1] = command;
    frame[2] = status.as_byte();
    frame[3..3 + payload.len()].copy_from_slice(payload);
    frame
}

fn spawn_request(
    channel: &Arc<CommandChannel>,
    command: Command,
) -> tokio::task::JoinHandle<Result<Vec<u8>, DeviceError>> {
    let channel = Arc::clone(channel);
    tokio::spawn(async move { channel.request(command, &[]).await })
}

#[tokio::test]
async fn test_replies_resolve_in_send_order() {
    let mut h = harness();
    let a = spawn_request(&h.channel, Command::RgblightEnableGet);
    assert_eq!(h.outbound.recv().await.unwrap()[1], 10);
    let b = spawn_request(&h.channel, Command::NkroGet);
    assert_eq!(h.outbound.recv().await.unwrap()[1], 30);
    assert_eq!(h.channel.pending_len(), 2);

    h.channel
        .on_frame(&reply(10, StatusCode::Ok, &[1]))
        .unwrap();
    assert_eq!(a.await.unwrap().unwrap()[0], 1);
    assert!(!b.is_finished());

    h.channel
        .on_frame(&reply(30, StatusCode::Ok, &[0]))
        .unwrap();
    assert_eq!(b.await.unwrap().unwrap()[0], 0);
}

#[tokio::test]
async fn test_device_error_fails_first_and_leaves_second_pending() {
    let mut h = harness();
    let a = spawn_request(&h.channel, Command::RgblightHsvGet);
    h.outbound.recv().await.unwrap();
    let b = spawn_request(&h.channel, Command::Ping);
    h.outbound.recv().await.unwrap();

    h.channel
        .on_frame(&reply(12, StatusCode::Error, &[]))
        .unwrap();
    assert_eq!(
        a.await.unwrap().unwrap_err(),
        DeviceError::Device {
            status: StatusCode::Error
        }
    );
    assert_eq!(h.channel.pending_len(), 1);
    assert!(!b.is_finished());

    h.channel.on_frame(&reply(1, StatusCode::Ok, &[])).unwrap();
    assert!(b.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_disconnect_fails_all_pending_in_one_wave() {
    let mut h = harness();
    let tasks: Vec<_> = (0..3)
        .map(|_| spawn_request(&h.channel, Command::Ping))
        .collect();
    for _ in 0..3 {
        h.outbound.recv().await.unwrap();
    }

    assert_eq!(h.channel.disconnect("unplugged"), 3);
    for task in tasks {
        assert_eq!(
            task.await.unwrap().unwrap_err(),
            DeviceError::TransportDisconnected {
                reason: "unplugged".to_string()
            }
        );
    }

    let err = h.channel.send(Command::Ping, true, &[]).await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_unsolicited_reply_poisons_until_reinitialized() {
    let mut h = harness();
    let err = h
        .channel
        .on_frame(&reply(1, StatusCode::Ok, &[]))
        .unwrap_err();
    assert!(matches!(err, DeviceError::ProtocolViolation { .. }));

    let refused = h.channel.request(Command::Ping, &[]).await.unwrap_err();
    assert!(matches!(refused, DeviceError::ProtocolViolation { .. }));
    assert!(h.outbound.try_recv().is_err());

    h.channel.reinitialize().unwrap();
    assert!(h.channel.fault().is_none());
    let task = spawn_request(&h.channel, Command::Ping);
    h.outbound.recv().await.unwrap();
    h.channel.on_frame(&reply(1, StatusCode::Ok, &[])).unwrap();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_oversized_payload_rejected_before_io() {
    let mut h = harness();
    let max = h.channel.max_payload();
    assert_eq!(max, 31);

    let err = h
        .channel
        .request(Command::RgblightSetMultiHsv, &vec![0u8; max + 1])
        .await
        .unwrap_err();
    assert_eq!(err, DeviceError::PayloadTooLarge { len: 32, max: 31 });
    assert!(h.outbound.try_recv().is_err());
    assert_eq!(h.channel.pending_len(), 0);

    h.channel
        .send(Command::RgblightSetMultiHsv, true, &vec![0u8; max])
        .await
        .unwrap();
    assert_eq!(h.outbound.recv().await.unwrap().len(), 33);
}

/// Silent light updates interleaved with a query keep the reply queue aligned.
#[tokio::test]
async fn test_silent_updates_do_not_shift_correlation() {
    let mut h = harness();
    let device = Arc::new(LightingDevice::new(Arc::clone(&h.channel)));

    let query = {
        let device = Arc::clone(&device);
        tokio::spawn(async move { device.rgblight_enabled().await })
    };
    h.outbound.recv().await.unwrap();

    let colors = vec![keylight::lighting::Hsv::new(300.0, 1.0, 1.0); 16];
    assert_eq!(device.set_offset_hsv(&colors, 0).await.unwrap(), 2);
    h.outbound.recv().await.unwrap();
    h.outbound.recv().await.unwrap();
    assert_eq!(h.channel.pending_len(), 1);

    h.channel
        .on_frame(&reply(10, StatusCode::Ok, &[1]))
        .unwrap();
    assert!(query.await.unwrap().unwrap());
}

#[tokio::test]
async fn test_reply_pump_disconnects_on_close() {
    let mut h = harness();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    let pump = spawn_reply_pump(Arc::clone(&h.channel), reply_rx);

    let first = spawn_request(&h.channel, Command::Ping);
    h.outbound.recv().await.unwrap();
    reply_tx.send(reply(1, StatusCode::Ok, &[])).unwrap();
    assert!(first.await.unwrap().is_ok());

    let second = spawn_request(&h.channel, Command::Ping);
    h.outbound.recv().await.unwrap();
    drop(reply_tx);
    pump.await.unwrap();

    assert!(matches!(
        second.await.unwrap().unwrap_err(),
        DeviceError::TransportDisconnected { .. }
    ));
}

/// Transport whose send suspends before the frame reaches the wire
struct YieldingTransport {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl Transport for YieldingTransport {
    fn send(&self, frame: Vec<u8>) -> BoxFuture<'_, Result<(), DeviceError>> {
        let outbound = self.outbound.clone();
        async move {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            outbound
                .send(frame)
                .map_err(|_| DeviceError::TransportDisconnected {
                    reason: "outbound receiver dropped".to_string(),
                })
        }
        .boxed()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_each_get_their_own_reply() {
    const CALLERS: u8 = 16;

    let (outbound_tx, mut outbound) = mpsc::unbounded_channel();
    let format = FrameFormat::from_config(&ProtocolConfig::default()).unwrap();
    let channel = Arc::new(CommandChannel::new(
        format,
        Arc::new(YieldingTransport {
            outbound: outbound_tx,
        }),
    ));

    // Keyboard answers in wire order, echoing the request's first payload byte
    let keyboard = {
        let channel = Arc::clone(&channel);
        tokio::spawn(async move {
            for _ in 0..CALLERS {
                let frame = outbound.recv().await.unwrap();
                channel
                    .on_frame(&reply(frame[1], StatusCode::Ok, &[frame[2]]))
                    .unwrap();
            }
        })
    };

    let callers: Vec<_> = (0..CALLERS)
        .map(|tag| {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { (tag, channel.request(Command::Ping, &[tag]).await) })
        })
        .collect();

    for caller in callers {
        let (tag, result) = caller.await.unwrap();
        assert_eq!(result.unwrap()[0], tag, "caller {} got another reply", tag);
    }
    keyboard.await.unwrap();
    assert_eq!(channel.pending_len(), 0);
    assert!(channel.fault().is_none());
}
