// Frame module - fixed-length report encoding and reply decoding
//
// Request:  [report_id, command | silent bit, payload..., 0-padding]
// Reply:    [report_id, command context, status, response payload...]
//
// Every frame on the wire is exactly `frame_len` bytes (report length plus
// the leading report id byte).

use crate::config::ProtocolConfig;
use crate::error::{ConfigError, DeviceError};
use crate::lighting::batch::OFFSET_HEADER_LEN;
use crate::lighting::COLOR_WIRE_LEN;

use super::command::{Command, StatusCode};

/// Byte offset of the status code in a reply
pub const STATUS_OFFSET: usize = 2;

/// Byte offset of the response payload in a reply
pub const RESPONSE_OFFSET: usize = 3;

/// Request header: report id + command byte
pub const REQUEST_HEADER_LEN: usize = 2;

/// Shortest frame that still carries one offset color update
pub const MIN_FRAME_LEN: usize = REQUEST_HEADER_LEN + OFFSET_HEADER_LEN + COLOR_WIRE_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    report_id: u8,
    frame_len: usize,
}

impl FrameFormat {
    /// `frame_len` counts the report id byte and must be at least `MIN_FRAME_LEN`
    pub fn new(report_id: u8, frame_len: usize) -> Result<Self, ConfigError> {
        if frame_len < MIN_FRAME_LEN {
            return Err(ConfigError::InvalidReportLen {
                len: frame_len.saturating_sub(1),
                min: MIN_FRAME_LEN - 1,
            });
        }
        Ok(Self {
            report_id,
            frame_len,
        })
    }

    pub fn from_config(config: &ProtocolConfig) -> Result<Self, ConfigError> {
        Self::new(config.report_id, config.frame_len())
    }

    pub fn report_id(&self) -> u8 {
        self.report_id
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn max_payload(&self) -> usize {
        self.frame_len.saturating_sub(REQUEST_HEADER_LEN)
    }

    /// Encode one request frame
    ///
    /// Fails with `PayloadTooLarge` before anything is built when the payload
    /// does not fit.
    pub fn encode(
        &self,
        command: Command,
        silent: bool,
        payload: &[u8],
    ) -> Result<Vec<u8>, DeviceError> {
        if payload.len() > self.max_payload() {
            return Err(DeviceError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_payload(),
            });
        }

        let mut frame = vec![0u8; self.frame_len];
        frame[0] = self.report_id;
        frame[1] = command.wire_byte(silent);
        frame[REQUEST_HEADER_LEN..REQUEST_HEADER_LEN + payload.len()].copy_from_slice(payload);
        Ok(frame)
    }
}

/// Decoded device reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub context: u8,
    pub status: StatusCode,
    pub payload: Vec<u8>,
}

impl Reply {
    /// Split a raw reply frame into its fields
    pub fn decode(frame: &[u8]) -> Result<Self, DeviceError> {
        if frame.len() < RESPONSE_OFFSET {
            return Err(DeviceError::MalformedReply { len: frame.len() });
        }
        Ok(Self {
            context: frame[1],
            status: StatusCode::from_byte(frame[STATUS_OFFSET]),
            payload: frame[RESPONSE_OFFSET..].to_vec(),
        })
    }

    /// Response payload for OK replies, typed failure otherwise
    pub fn into_result(self) -> Result<Vec<u8>, DeviceError> {
        if self.status.is_ok() {
            Ok(self.payload)
        } else {
            Err(DeviceError::Device {
                status: self.status,
            })
        }
    }
}

/// Uppercase dash-separated hex, e.g. `00-01-FF`
pub fn hex_dump(frame: &[u8]) -> String {
    frame
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> FrameFormat {
        FrameFormat::from_config(&ProtocolConfig::default()).unwrap()
    }

    #[test]
    fn encodes_header_payload_and_padding() {
        let frame = format()
            .encode(Command::RgblightHsvSet, false, &[10, 20, 30])
            .unwrap();
        assert_eq!(frame.len(), 33);
        assert_eq!(&frame[..5], &[0, 13, 10, 20, 30]);
        assert!(frame[5..].iter().all(|b| *b == 0));
    }

    #[test]
    fn silent_commands_set_high_bit() {
        let frame = format()
            .encode(Command::RgblightSetOffsetHsv, true, &[])
            .unwrap();
        assert_eq!(frame[1], 0x80 | 18);
    }

    #[test]
    fn report_id_is_written_to_byte_zero() {
        let frame = FrameFormat::new(7, 9)
            .unwrap()
            .encode(Command::Ping, false, &[])
            .unwrap();
        assert_eq!(frame, vec![7, 1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn frame_without_room_for_a_color_is_rejected() {
        for frame_len in [0, 1, 2, MIN_FRAME_LEN - 1] {
            assert!(matches!(
                FrameFormat::new(0, frame_len),
                Err(ConfigError::InvalidReportLen { min: 6, .. })
            ));
        }
        let format = FrameFormat::new(0, MIN_FRAME_LEN).unwrap();
        assert_eq!(format.max_payload(), OFFSET_HEADER_LEN + COLOR_WIRE_LEN);
    }

    #[test]
    fn full_payload_fits() {
        let payload = [0xAA; 31];
        let frame = format().encode(Command::Ping, false, &payload).unwrap();
        assert_eq!(&frame[2..], &payload[..]);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let err = format()
            .encode(Command::Ping, false, &[0; 32])
            .unwrap_err();
        assert_eq!(err, DeviceError::PayloadTooLarge { len: 32, max: 31 });
    }

    #[test]
    fn decodes_ok_reply() {
        let reply = Reply::decode(&[0, 12, 1, 85, 255, 128]).unwrap();
        assert_eq!(reply.status, StatusCode::Ok);
        assert_eq!(reply.context, 12);
        assert_eq!(reply.into_result().unwrap(), vec![85, 255, 128]);
    }

    #[test]
    fn non_ok_reply_is_typed_failure() {
        let reply = Reply::decode(&[0, 12, 4, 0, 0]).unwrap();
        assert_eq!(
            reply.into_result(),
            Err(DeviceError::Device {
                status: StatusCode::Invalid
            })
        );
    }

    #[test]
    fn short_reply_is_malformed() {
        assert_eq!(
            Reply::decode(&[0, 1]),
            Err(DeviceError::MalformedReply { len: 2 })
        );
    }

    #[test]
    fn hex_dump_format() {
        assert_eq!(hex_dump(&[0, 1, 0xFF]), "00-01-FF");
    }
}
