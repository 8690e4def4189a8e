//! cpal output for [`SoftDevice`](super::SoftDevice) contexts.
//!
//! Each context with hardware behind it owns one output stream. The stream callback
//! mixes straight from the device state.

use super::ContextAttributes;
use super::mixer;
use crate::error::{PetalSonicError, Result};
use super::soft::DeviceState;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// cpal output stream rendering a [`SoftDevice`](super::SoftDevice) context.
///
/// The stream stops when this is dropped.
pub(super) struct OutputStream {
    _stream: cpal::Stream,
    frames_rendered: Arc<AtomicUsize>,
}

impl OutputStream {
    /// Default output device, or the one whose name matches `name`.
    pub(super) fn find_device(name: Option<&str>) -> Option<cpal::Device> {
        let host = cpal::default_host();
        let device = match name {
            None => host.default_output_device(),
            Some(name) => host
                .output_devices()
                .map_err(|e| log::error!("Failed to enumerate output devices: {}", e))
                .ok()?
                .find(|device| device.name().is_ok_and(|n| n == name)),
        };

        match &device {
            Some(device) => log::info!(
                "Opened output device: {}",
                device.name().unwrap_or_else(|_| "Unknown Device".to_string())
            ),
            None => log::warn!("No output device available for {:?}", name),
        }
        device
    }

    /// Build and start a stream that pulls from the mixer.
    pub(super) fn start(
        device: &cpal::Device,
        attributes: &ContextAttributes,
        state: Arc<Mutex<DeviceState>>,
    ) -> Result<Self> {
        let config = cpal::StreamConfig {
            channels: attributes.channels,
            sample_rate: cpal::SampleRate(attributes.frequency),
            buffer_size: cpal::BufferSize::Fixed(attributes.block_size as u32),
        };

        let default_config = device
            .default_output_config()
            .map_err(|e| {
                PetalSonicError::AudioDevice(format!("Failed to get default config: {}", e))
            })?;

        let frames_rendered = Arc::new(AtomicUsize::new(0));
        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(device, &config, state, frames_rendered.clone())?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(device, &config, state, frames_rendered.clone())?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(device, &config, state, frames_rendered.clone())?
            }
            other => {
                return Err(PetalSonicError::AudioDevice(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| PetalSonicError::AudioDevice(format!("Failed to start stream: {}", e)))?;

        log::info!(
            "Output stream started: {} Hz, {} channels, block size {}",
            attributes.frequency,
            attributes.channels,
            attributes.block_size
        );

        Ok(Self {
            _stream: stream,
            frames_rendered,
        })
    }

    pub(super) fn frames_rendered(&self) -> usize {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        state: Arc<Mutex<DeviceState>>,
        frames_rendered: Arc<AtomicUsize>,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels;
        let sample_rate = config.sample_rate.0;
        let mut scratch: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);

                    // Never block the driver thread; render silence on contention.
                    let frames = match state.try_lock() {
                        Some(mut state) => {
                            mixer::render(&mut state, &mut scratch, channels, sample_rate)
                        }
                        None => {
                            scratch.fill(0.0);
                            0
                        }
                    };

                    for (sample, value) in data.iter_mut().zip(scratch.iter()) {
                        *sample = T::from_sample(*value);
                    }

                    frames_rendered.fetch_add(frames, Ordering::Relaxed);
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| PetalSonicError::AudioDevice(format!("Failed to build stream: {}", e)))
    }
}
