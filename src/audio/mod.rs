// Audio module - windowed frame accumulation for the capture callback

pub mod accumulator;
pub mod window;

// Re-export commonly used types for convenience
pub use accumulator::FrameAccumulator;
