//! Typed keyboard lighting API on top of [`CommandChannel`].
//!
//! Queries await their reply. Batched light updates (`set_offset_*` and
//! `set_multi_*`) are silent and return as soon as every frame is handed to
//! the transport.

use std::sync::Arc;

use crate::error::DeviceError;
use crate::lighting::{BatchedLightCommandBuilder, Hsv, Rgb, WireColor, COLOR_WIRE_LEN};
use crate::telemetry::{self, ChannelPhase};

use super::channel::CommandChannel;
use super::command::Command;

pub struct LightingDevice {
    channel: Arc<CommandChannel>,
    batcher: BatchedLightCommandBuilder,
}

impl LightingDevice {
    /// Batch capacity follows the channel's frame length; `FrameFormat::new`
    /// guarantees room for at least one color per frame.
    pub fn new(channel: Arc<CommandChannel>) -> Self {
        let batcher = BatchedLightCommandBuilder::new(channel.max_payload());
        Self { channel, batcher }
    }

    pub fn channel(&self) -> &Arc<CommandChannel> {
        &self.channel
    }

    pub fn batcher(&self) -> &BatchedLightCommandBuilder {
        &self.batcher
    }

    /// Confirm the device answers before any lighting traffic
    pub async fn initialize(&self) -> Result<(), DeviceError> {
        self.ping().await?;
        log::info!(
            "[LightingDevice] Initialized ({} colors per frame)",
            self.batcher.colors_per_frame()
        );
        telemetry::hub().record_phase(ChannelPhase::Initialized);
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), DeviceError> {
        self.channel.request(Command::Ping, &[]).await.map(|_| ())
    }

    pub async fn rgblight_enabled(&self) -> Result<bool, DeviceError> {
        self.query_flag(Command::RgblightEnableGet).await
    }

    pub async fn set_rgblight_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        self.channel
            .request(Command::RgblightEnableSet, &[enabled as u8])
            .await
            .map(|_| ())
    }

    pub async fn hsv(&self) -> Result<Hsv, DeviceError> {
        let payload = self.channel.request(Command::RgblightHsvGet, &[]).await?;
        if payload.len() < COLOR_WIRE_LEN {
            return Err(DeviceError::InvalidResponse {
                command: Command::RgblightHsvGet,
                len: payload.len(),
            });
        }
        Ok(Hsv::from_wire([payload[0], payload[1], payload[2]]))
    }

    /// Set the base color; `persist` selects the EEPROM-writing variant
    pub async fn set_hsv(&self, color: Hsv, persist: bool) -> Result<(), DeviceError> {
        let command = if persist {
            Command::RgblightHsvSet
        } else {
            Command::RgblightHsvSetNoEeprom
        };
        self.channel
            .request(command, &color.to_wire())
            .await
            .map(|_| ())
    }

    /// Contiguous HSV run starting at LED `start_offset`; returns frames sent
    pub async fn set_offset_hsv(&self, colors: &[Hsv], start_offset: u8) -> Result<usize, DeviceError> {
        self.send_offset(Command::RgblightSetOffsetHsv, colors, start_offset)
            .await
    }

    /// Contiguous RGB run starting at LED `start_offset`; returns frames sent
    pub async fn set_offset_rgb(&self, colors: &[Rgb], start_offset: u8) -> Result<usize, DeviceError> {
        self.send_offset(Command::RgblightSetOffsetRgb, colors, start_offset)
            .await
    }

    pub async fn set_multi_hsv(&self, entries: &[(u8, Hsv)]) -> Result<usize, DeviceError> {
        self.send_indexed(Command::RgblightSetMultiHsv, entries).await
    }

    pub async fn set_multi_rgb(&self, entries: &[(u8, Rgb)]) -> Result<usize, DeviceError> {
        self.send_indexed(Command::RgblightSetMultiRgb, entries).await
    }

    pub async fn nkro(&self) -> Result<bool, DeviceError> {
        self.query_flag(Command::NkroGet).await
    }

    pub async fn set_nkro(&self, enabled: bool) -> Result<(), DeviceError> {
        self.channel
            .request(Command::NkroSet, &[enabled as u8])
            .await
            .map(|_| ())
    }

    /// Reboot the keyboard; it does not reply
    pub async fn reset(&self) -> Result<(), DeviceError> {
        self.channel.send_silent(Command::Reset, &[]).await
    }

    /// Restore EEPROM defaults; it does not reply
    pub async fn reset_eeprom(&self) -> Result<(), DeviceError> {
        self.channel.send_silent(Command::ResetEeprom, &[]).await
    }

    async fn query_flag(&self, command: Command) -> Result<bool, DeviceError> {
        let payload = self.channel.request(command, &[]).await?;
        match payload.first() {
            Some(flag) => Ok(*flag != 0),
            None => Err(DeviceError::InvalidResponse { command, len: 0 }),
        }
    }

    async fn send_offset<C: WireColor>(
        &self,
        command: Command,
        colors: &[C],
        start_offset: u8,
    ) -> Result<usize, DeviceError> {
        let batches = self.batcher.build_offset(colors, start_offset)?;
        for batch in &batches {
            self.channel.send_silent(command, &batch.payload).await?;
        }
        Ok(batches.len())
    }

    async fn send_indexed<C: WireColor>(
        &self,
        command: Command,
        entries: &[(u8, C)],
    ) -> Result<usize, DeviceError> {
        let payloads = self.batcher.build_indexed(entries);
        for payload in &payloads {
            self.channel.send_silent(command, payload).await?;
        }
        Ok(payloads.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::error::ErrorCode;
    use crate::protocol::{ChannelTransport, FrameFormat};
    use tokio::sync::mpsc;

    fn device() -> (Arc<LightingDevice>, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (transport, rx) = ChannelTransport::new();
        let format = FrameFormat::from_config(&ProtocolConfig::default()).unwrap();
        let channel = Arc::new(CommandChannel::new(format, Arc::new(transport)));
        (Arc::new(LightingDevice::new(channel)), rx)
    }

    fn ok_reply(payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 33];
        frame[2] = 1;
        frame[3..3 + payload.len()].copy_from_slice(payload);
        frame
    }

    #[tokio::test]
    async fn sixteen_leds_take_two_silent_frames() {
        let (device, mut rx) = device();
        let colors = vec![Hsv::new(300.0, 1.0, 1.0); 16];
        assert_eq!(device.set_offset_hsv(&colors, 0).await.unwrap(), 2);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first[1], 18 | 0x80);
        assert_eq!(&first[2..4], &[9, 0]);
        assert_eq!(&second[2..4], &[7, 9]);
        assert_eq!(&second[4..7], &[213, 255, 255]);
        assert_eq!(device.channel().pending_len(), 0);
    }

    #[tokio::test]
    async fn offset_run_past_last_led_sends_nothing() {
        let (device, mut rx) = device();
        let colors = vec![Hsv::new(0.0, 1.0, 1.0); 300];
        let err = device.set_offset_hsv(&colors, 0).await.unwrap_err();
        assert_eq!(
            err,
            DeviceError::OffsetOutOfRange {
                start: 0,
                count: 300
            }
        );

        let err = device
            .set_offset_rgb(&[Rgb::new(1, 2, 3); 8], 250)
            .await
            .unwrap_err();
        assert_eq!(err.code(), 3008);
        assert!(rx.try_recv().is_err());
        assert!(device.channel().fault().is_none());
    }

    #[tokio::test]
    async fn indexed_rgb_update_is_silent() {
        let (device, mut rx) = device();
        let entries = [(3u8, Rgb::new(1, 2, 3))];
        assert_eq!(device.set_multi_rgb(&entries).await.unwrap(), 1);
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame[1], 15 | 0x80);
        assert_eq!(&frame[2..7], &[1, 3, 1, 2, 3]);
    }

    #[tokio::test]
    async fn hsv_query_decodes_reply() {
        let (device, mut rx) = device();
        let task = {
            let device = Arc::clone(&device);
            tokio::spawn(async move { device.hsv().await })
        };
        let request = rx.recv().await.unwrap();
        assert_eq!(request[1], 12);
        device.channel().on_frame(&ok_reply(&[0, 255, 255])).unwrap();

        let color = task.await.unwrap().unwrap();
        assert_eq!(color.hue, 0.0);
        assert_eq!(color.value, 1.0);
    }

    #[tokio::test]
    async fn nkro_flag_reads_first_byte() {
        let (device, mut rx) = device();
        let task = {
            let device = Arc::clone(&device);
            tokio::spawn(async move { device.nkro().await })
        };
        rx.recv().await.unwrap();
        device.channel().on_frame(&ok_reply(&[1])).unwrap();
        assert!(task.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn set_hsv_without_persist_uses_noeeprom_command() {
        let (device, mut rx) = device();
        let task = {
            let device = Arc::clone(&device);
            tokio::spawn(async move { device.set_hsv(Hsv::new(0.0, 1.0, 0.5), false).await })
        };
        let request = rx.recv().await.unwrap();
        assert_eq!(request[1], 14);
        assert_eq!(&request[2..5], &[0, 255, 128]);
        device.channel().on_frame(&ok_reply(&[])).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reset_commands_do_not_wait() {
        let (device, mut rx) = device();
        device.reset().await.unwrap();
        device.reset_eeprom().await.unwrap();
        assert_eq!(rx.recv().await.unwrap()[1], 60 | 0x80);
        assert_eq!(rx.recv().await.unwrap()[1], 61 | 0x80);
    }
}
