// RefreshDriver - periodic bucket → color → device loop
//
// Runs on its own timer, independent of the capture callback. Each tick
// copies the smoothed bucket vector out of the shared history (short lock),
// maps it to per-LED colors and pushes silent offset updates to the device.
// Ticks with no new analysis pass since the previous one send nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::analysis::BucketReader;
use crate::config::{ColorEncoding, LightingConfig};
use crate::error::{log_device_error, ConfigError, DeviceError};
use crate::lighting::{Hsv, IntensityMapper, Rgb};
use crate::protocol::LightingDevice;
use crate::telemetry;

pub struct RefreshDriver {
    reader: BucketReader,
    mapper: IntensityMapper,
    device: Arc<LightingDevice>,
    encoding: ColorEncoding,
    start_offset: u8,
    intensities: Vec<f32>,
    colors: Vec<Hsv>,
}

impl RefreshDriver {
    pub fn new(
        reader: BucketReader,
        lighting: &LightingConfig,
        device: Arc<LightingDevice>,
    ) -> Result<Self, ConfigError> {
        lighting.validate(reader.bucket_count())?;

        let bucket_count = reader.bucket_count();
        let led_count = lighting.led_count();
        Ok(Self {
            reader,
            mapper: IntensityMapper::new(lighting.led_map.clone()),
            device,
            encoding: lighting.color_encoding,
            start_offset: lighting.start_offset,
            intensities: vec![0.0; bucket_count],
            colors: vec![Hsv::new(0.0, 0.0, 0.0); led_count],
        })
    }

    /// Colors produced by the most recent refresh, in physical LED order
    pub fn colors(&self) -> &[Hsv] {
        &self.colors
    }

    /// Run one refresh; returns the number of frames sent (0 when idle)
    pub async fn refresh_once(&mut self) -> Result<usize, DeviceError> {
        if !self.reader.take_fresh() {
            return Ok(0);
        }

        self.reader.read(&mut self.intensities);
        self.mapper.map_into(&self.intensities, &mut self.colors);

        let frames = match self.encoding {
            ColorEncoding::Hsv => {
                self.device
                    .set_offset_hsv(&self.colors, self.start_offset)
                    .await?
            }
            ColorEncoding::Rgb => {
                let rgb: Vec<Rgb> = self.colors.iter().copied().map(Rgb::from).collect();
                self.device.set_offset_rgb(&rgb, self.start_offset).await?
            }
        };

        telemetry::hub().record_refresh(frames, self.reader.passes());
        Ok(frames)
    }

    /// Refresh at `rate_hz` until `shutdown` flips to true or its sender drops
    ///
    /// Non-fatal device errors are logged and the loop continues; a fatal
    /// channel fault ends the loop with that error. Returns the number of
    /// ticks that sent at least one frame.
    pub async fn run(
        &mut self,
        rate_hz: u32,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<u64, DeviceError> {
        let period = Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1)));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!(
            "[RefreshDriver] Starting at {}Hz ({} LEDs, {:?})",
            rate_hz,
            self.mapper.led_count(),
            self.encoding
        );

        let mut refreshes = 0u64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.refresh_once().await {
                        Ok(0) => {}
                        Ok(_) => refreshes += 1,
                        Err(err) if err.is_fatal() => {
                            log_device_error(&err, "RefreshDriver::run");
                            return Err(err);
                        }
                        Err(err) => log_device_error(&err, "RefreshDriver::run"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("[RefreshDriver] Stopped after {} refreshes", refreshes);
        Ok(refreshes)
    }
}
