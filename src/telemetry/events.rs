//! Telemetry event types describing device channel and refresh activity.

use serde::{Deserialize, Serialize};

use crate::protocol::{Command, StatusCode};

/// Lifecycle stages of the command channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPhase {
    Initialized,
    Disconnected,
    Faulted,
    Reinitialized,
}

/// Metric events covering frames, replies, failures and refresh ticks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    FrameSent {
        command: Command,
        silent: bool,
    },
    ReplyReceived {
        status: StatusCode,
        latency_ms: f32,
    },
    ReplyLatency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    DeviceFailure {
        code: i32,
        message: String,
    },
    ChannelLifecycle {
        phase: ChannelPhase,
        timestamp_ms: u64,
    },
    Refresh {
        frames: usize,
        analysis_passes: u64,
    },
}
