//! Channel telemetry.
//!
//! The hub keeps running totals per event kind, a round-trip window over
//! recent replies and a short log of the latest events. Everything is
//! in-process; the CLI prints a summary after a run.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, ErrorCode};
use crate::protocol::{Command, StatusCode};

pub mod events;

pub use events::{ChannelPhase, MetricEvent};

static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Process-wide hub fed by the command channel and the refresh driver
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

// Telemetry must never take the caller down with it
fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Totals since the hub was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTotals {
    pub frames_sent: u64,
    pub silent_frames: u64,
    pub replies_ok: u64,
    pub replies_rejected: u64,
    pub failures: u64,
    pub refreshes: u64,
    pub lighting_frames: u64,
}

#[derive(Default)]
struct Counters {
    frames_sent: AtomicU64,
    silent_frames: AtomicU64,
    replies_ok: AtomicU64,
    replies_rejected: AtomicU64,
    failures: AtomicU64,
    refreshes: AtomicU64,
    lighting_frames: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn totals(&self) -> ChannelTotals {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ChannelTotals {
            frames_sent: load(&self.frames_sent),
            silent_frames: load(&self.silent_frames),
            replies_ok: load(&self.replies_ok),
            replies_rejected: load(&self.replies_rejected),
            failures: load(&self.failures),
            refreshes: load(&self.refreshes),
            lighting_frames: load(&self.lighting_frames),
        }
    }
}

/// Average and worst reply round trip over the window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundTrip {
    pub avg_ms: f32,
    pub max_ms: f32,
    pub samples: usize,
}

/// Last `capacity` reply latencies with a running sum
struct RoundTripWindow {
    latencies: VecDeque<f32>,
    capacity: usize,
    sum: f32,
}

impl RoundTripWindow {
    fn new(capacity: usize) -> Self {
        Self {
            latencies: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    fn push(&mut self, latency_ms: f32) -> RoundTrip {
        if self.latencies.len() == self.capacity {
            if let Some(old) = self.latencies.pop_front() {
                self.sum -= old;
            }
        }
        let latency_ms = latency_ms.max(0.0);
        self.latencies.push_back(latency_ms);
        self.sum += latency_ms;
        self.summary()
    }

    fn summary(&self) -> RoundTrip {
        let samples = self.latencies.len();
        if samples == 0 {
            return RoundTrip::default();
        }
        RoundTrip {
            avg_ms: self.sum / samples as f32,
            max_ms: self.latencies.iter().copied().fold(0.0, f32::max),
            samples,
        }
    }
}

/// Newest events, oldest evicted first
struct EventLog {
    events: VecDeque<MetricEvent>,
    capacity: usize,
    evicted: u64,
}

impl EventLog {
    fn push(&mut self, event: MetricEvent) {
        if self.capacity == 0 {
            self.evicted += 1;
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.evicted += 1;
        }
        self.events.push_back(event);
    }
}

/// Point-in-time copy of the hub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub totals: ChannelTotals,
    pub round_trip: RoundTrip,
    pub recent: Vec<MetricEvent>,
    pub evicted_events: u64,
}

pub struct TelemetryHub {
    counters: Counters,
    round_trip: Mutex<RoundTripWindow>,
    log: Mutex<EventLog>,
}

impl TelemetryHub {
    pub fn new(log_capacity: usize, latency_window: usize) -> Self {
        Self {
            counters: Counters::default(),
            round_trip: Mutex::new(RoundTripWindow::new(latency_window.max(1))),
            log: Mutex::new(EventLog {
                events: VecDeque::with_capacity(log_capacity),
                capacity: log_capacity,
                evicted: 0,
            }),
        }
    }

    fn log(&self, event: MetricEvent) {
        relock(&self.log).push(event);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let log = relock(&self.log);
        TelemetrySnapshot {
            totals: self.counters.totals(),
            round_trip: relock(&self.round_trip).summary(),
            recent: log.events.iter().cloned().collect(),
            evicted_events: log.evicted,
        }
    }

    pub fn record_frame_sent(&self, command: Command, silent: bool) {
        Counters::bump(&self.counters.frames_sent, 1);
        if silent {
            Counters::bump(&self.counters.silent_frames, 1);
        }
        self.log(MetricEvent::FrameSent { command, silent });
    }

    /// Count a correlated reply and fold its round trip into the window
    pub fn record_reply(&self, status: StatusCode, latency_ms: f32) {
        if status.is_ok() {
            Counters::bump(&self.counters.replies_ok, 1);
        } else {
            Counters::bump(&self.counters.replies_rejected, 1);
        }
        self.log(MetricEvent::ReplyReceived { status, latency_ms });

        let round_trip = relock(&self.round_trip).push(latency_ms);
        self.log(MetricEvent::ReplyLatency {
            avg_ms: round_trip.avg_ms,
            max_ms: round_trip.max_ms,
            sample_count: round_trip.samples,
        });
    }

    pub fn record_failure(&self, err: &DeviceError) {
        Counters::bump(&self.counters.failures, 1);
        self.log(MetricEvent::DeviceFailure {
            code: err.code(),
            message: err.message(),
        });
    }

    pub fn record_phase(&self, phase: ChannelPhase) {
        self.log(MetricEvent::ChannelLifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_refresh(&self, frames: usize, analysis_passes: u64) {
        Counters::bump(&self.counters.refreshes, 1);
        Counters::bump(&self.counters.lighting_frames, frames as u64);
        self.log(MetricEvent::Refresh {
            frames,
            analysis_passes,
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(64, 32)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
