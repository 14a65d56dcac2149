// Command channel - one frame out, at most one correlated reply back
//
// The wire format carries no request id. Replies are matched to requests
// purely by FIFO order, so "enqueue reply slot + transmit frame" runs under a
// single-slot async gate. Reply handling pops the oldest slot.
//
// Request lifecycle: created → enqueued → sent → resolved | failed.
// Silent commands skip the enqueue step and resolve as soon as the frame is
// handed to the transport.
//
// Faults:
// - a reply with no pending slot poisons the channel (ProtocolViolation)
// - a transport disconnect fails every pending slot in one wave
// Both refuse further sends until `reinitialize`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::oneshot;

use crate::error::{log_device_error, DeviceError};
use crate::telemetry::{self, ChannelPhase};

use super::command::{Command, StatusCode};
use super::frame::{hex_dump, FrameFormat, Reply};
use super::transport::Transport;

type ReplySender = oneshot::Sender<Result<Vec<u8>, DeviceError>>;

struct PendingSlot {
    command: Command,
    enqueued_at: Instant,
    reply: ReplySender,
}

#[derive(Default)]
struct PendingReplies {
    queue: VecDeque<PendingSlot>,
    fault: Option<DeviceError>,
}

pub struct CommandChannel {
    format: FrameFormat,
    transport: Arc<dyn Transport>,
    gate: tokio::sync::Mutex<()>,
    pending: Mutex<PendingReplies>,
}

impl CommandChannel {
    pub fn new(format: FrameFormat, transport: Arc<dyn Transport>) -> Self {
        Self {
            format,
            transport,
            gate: tokio::sync::Mutex::new(()),
            pending: Mutex::new(PendingReplies::default()),
        }
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn max_payload(&self) -> usize {
        self.format.max_payload()
    }

    fn lock_pending(&self) -> Result<MutexGuard<'_, PendingReplies>, DeviceError> {
        self.pending.lock().map_err(|_| DeviceError::LockPoisoned {
            component: "pending_replies".to_string(),
        })
    }

    /// Number of requests waiting for a reply
    pub fn pending_len(&self) -> usize {
        self.lock_pending().map(|p| p.queue.len()).unwrap_or(0)
    }

    /// Fault that currently blocks sends, if any
    pub fn fault(&self) -> Option<DeviceError> {
        self.lock_pending().ok().and_then(|p| p.fault.clone())
    }

    /// Send a command expecting a reply; resolves with the response payload
    pub async fn request(&self, command: Command, payload: &[u8]) -> Result<Vec<u8>, DeviceError> {
        self.send(command, false, payload).await
    }

    /// Send a command the device will not answer
    pub async fn send_silent(&self, command: Command, payload: &[u8]) -> Result<(), DeviceError> {
        self.send(command, true, payload).await.map(|_| ())
    }

    /// Encode, transmit and (unless silent) await the correlated reply
    ///
    /// Oversized payloads fail before any frame is built or sent. Silent
    /// sends resolve with an empty vector.
    pub async fn send(
        &self,
        command: Command,
        silent: bool,
        payload: &[u8],
    ) -> Result<Vec<u8>, DeviceError> {
        let frame = self.format.encode(command, silent, payload)?;

        let reply = {
            let _gate = self.gate.lock().await;

            let reply = {
                let mut pending = self.lock_pending()?;
                if let Some(fault) = &pending.fault {
                    return Err(fault.clone());
                }
                if silent {
                    None
                } else {
                    let (tx, rx) = oneshot::channel();
                    pending.queue.push_back(PendingSlot {
                        command,
                        enqueued_at: Instant::now(),
                        reply: tx,
                    });
                    Some(rx)
                }
            };

            tracing::debug!("[>] {}", hex_dump(&frame));
            if let Err(err) = self.transport.send(frame).await {
                log_device_error(&err, "CommandChannel::send");
                self.disconnect(&disconnect_reason(&err));
                return Err(err);
            }
            telemetry::hub().record_frame_sent(command, silent);
            reply
        };

        match reply {
            None => Ok(Vec::new()),
            Some(rx) => rx.await.unwrap_or_else(|_| {
                Err(DeviceError::TransportDisconnected {
                    reason: "reply slot dropped".to_string(),
                })
            }),
        }
    }

    /// Inbound frame handler; call once per frame received from the device
    ///
    /// Returns `Err` only for channel-level faults. Device status failures are
    /// routed to the waiting caller instead.
    pub fn on_frame(&self, frame: &[u8]) -> Result<(), DeviceError> {
        tracing::debug!("[<] {}", hex_dump(frame));

        let slot = {
            let mut pending = self.lock_pending()?;
            match pending.queue.pop_front() {
                Some(slot) => slot,
                None => {
                    let err = DeviceError::ProtocolViolation {
                        detail: format!("unsolicited reply {}", hex_dump(frame)),
                    };
                    pending.fault = Some(err.clone());
                    drop(pending);

                    log_device_error(&err, "CommandChannel::on_frame");
                    telemetry::hub().record_failure(&err);
                    telemetry::hub().record_phase(ChannelPhase::Faulted);
                    return Err(err);
                }
            }
        };

        let latency_ms = slot.enqueued_at.elapsed().as_secs_f32() * 1000.0;
        let result = Reply::decode(frame).and_then(Reply::into_result);
        match &result {
            Ok(_) => telemetry::hub().record_reply(StatusCode::Ok, latency_ms),
            Err(DeviceError::Device { status }) => {
                log::warn!("[CommandChannel] {} failed with {}", slot.command, status);
                telemetry::hub().record_reply(*status, latency_ms);
            }
            Err(err) => telemetry::hub().record_failure(err),
        }

        // The caller may have stopped waiting; nothing to do then.
        let _ = slot.reply.send(result);
        Ok(())
    }

    /// Fail every pending request and refuse sends until reinitialized
    ///
    /// Returns the number of requests that were failed.
    pub fn disconnect(&self, reason: &str) -> usize {
        let err = DeviceError::TransportDisconnected {
            reason: reason.to_string(),
        };
        let drained: Vec<PendingSlot> = {
            let mut pending = match self.lock_pending() {
                Ok(pending) => pending,
                Err(lock_err) => {
                    log_device_error(&lock_err, "CommandChannel::disconnect");
                    return 0;
                }
            };
            pending.fault = Some(err.clone());
            pending.queue.drain(..).collect()
        };

        let failed = drained.len();
        for slot in drained {
            let _ = slot.reply.send(Err(err.clone()));
        }

        log::warn!(
            "[CommandChannel] Disconnected ({}), failed {} pending request(s)",
            reason,
            failed
        );
        telemetry::hub().record_failure(&err);
        telemetry::hub().record_phase(ChannelPhase::Disconnected);
        failed
    }

    /// Clear a fault so the channel accepts sends again
    pub fn reinitialize(&self) -> Result<(), DeviceError> {
        let mut pending = self.lock_pending()?;
        if let Some(fault) = pending.fault.take() {
            log::info!("[CommandChannel] Reinitialized after: {}", fault);
        }
        pending.queue.clear();
        telemetry::hub().record_phase(ChannelPhase::Reinitialized);
        Ok(())
    }
}

fn disconnect_reason(err: &DeviceError) -> String {
    match err {
        DeviceError::TransportDisconnected { reason } => reason.clone(),
        other => other.to_string(),
    }
}
