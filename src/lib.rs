// Keylight core - audio-reactive keyboard lighting
//
// Capture side: FrameAccumulator → FFT → A-weighted dB buckets → history.
// Refresh side: smoothed buckets → HSV colors → batched silent frames over
// the framed HID command channel.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod lighting;
pub mod protocol;
pub mod telemetry;

pub use analysis::{BucketReader, SpectrumPipeline};
pub use config::AppConfig;
pub use engine::RefreshDriver;
pub use error::{ConfigError, DeviceError, ErrorCode};
pub use lighting::{Hsv, IntensityMapper, Rgb};
pub use protocol::{ChannelTransport, Command, CommandChannel, FrameFormat, LightingDevice};
