// Lighting module - intensity-to-color mapping and batched light payloads

pub mod batch;
pub mod color;
pub mod mapper;

pub use batch::{max_colors_per_frame, BatchedLightCommandBuilder, LightBatch};
pub use color::{Hsv, Rgb, WireColor, COLOR_WIRE_LEN};
pub use mapper::{intensity_to_color, IntensityMapper};
