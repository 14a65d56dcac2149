// Desktop capture backend (cpal)
//
// Opens the default input device, builds a SpectrumPipeline at the device's
// native sample rate and moves it into the input callback. The callback only
// accumulates and analyses; it never touches the device channel.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::analysis::{BucketReader, SpectrumPipeline};
use crate::config::AnalysisConfig;

/// Running input stream; capture stops when this is dropped
pub struct CaptureStream {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: usize,
}

impl CaptureStream {
    /// Open the default input device and start feeding the analysis pipeline
    pub fn start(config: &AnalysisConfig) -> Result<(Self, BucketReader)> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No default input device found"))?;

        let supported = device
            .default_input_config()
            .context("querying default input config")?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(anyhow!(
                "Only F32 input is supported (device offers {:?})",
                supported.sample_format()
            ));
        }

        let stream_config: cpal::StreamConfig = supported.into();
        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels as usize;

        let (mut pipeline, reader) = SpectrumPipeline::new(config, sample_rate)?;

        let err_fn = |err| log::error!("[CaptureStream] Input stream error: {}", err);
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    pipeline.process_interleaved(data, channels);
                },
                err_fn,
                None,
            )
            .context("building input stream")?;
        stream.play().context("starting input stream")?;

        log::info!(
            "[CaptureStream] Capturing {} channel(s) at {}Hz",
            channels,
            sample_rate
        );

        Ok((
            Self {
                stream,
                sample_rate,
                channels,
            },
            reader,
        ))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn pause(&self) -> Result<()> {
        self.stream.pause().context("pausing input stream")
    }
}
