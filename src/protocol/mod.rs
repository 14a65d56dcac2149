// Protocol module - framed HID command/response plumbing
//
// Layers, bottom-up:
// - command: command and status codes
// - frame: fixed-length request encoding, reply decoding
// - transport: the outbound seam plus an in-process mpsc implementation
// - channel: FIFO reply correlation behind a single-slot send gate
// - device: typed lighting API built on the channel

pub mod channel;
pub mod command;
pub mod device;
pub mod frame;
pub mod transport;

pub use channel::CommandChannel;
pub use command::{Command, StatusCode, SILENT_FLAG};
pub use device::LightingDevice;
pub use frame::{hex_dump, FrameFormat, Reply};
pub use transport::{spawn_reply_pump, ChannelTransport, Transport};
