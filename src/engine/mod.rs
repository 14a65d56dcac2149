// Engine module - drivers that connect capture, analysis and the device
//
// - RefreshDriver: timer-driven color refresh (always available)
// - CaptureStream: cpal input backend, behind the `cpal-capture` feature

#[cfg(feature = "cpal-capture")]
pub mod capture;
pub mod refresh;

#[cfg(feature = "cpal-capture")]
pub use capture::CaptureStream;
pub use refresh::RefreshDriver;
