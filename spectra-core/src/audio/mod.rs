//! Audio capture via cpal backend.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not**:
//! - Allocate heap memory
//! - Wait on anything but the short sample-buffer critical section
//! - Perform I/O or logging
//!
//! Every callback forwards its interleaved block straight into
//! `CaptureHandle::push_interleaved_with`, which converts samples in place
//! while copying them into the ring.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `AudioCapture` therefore must be created and dropped on the same
//! thread. The coordinator does this on its dedicated capture thread.

pub mod device;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, SupportedStreamConfig,
};

#[cfg(feature = "audio-cpal")]
use crate::buffering::CHANNEL_COUNT;
use crate::{
    engine::CaptureHandle,
    error::{Result, SpectraError},
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Handle to an active stereo capture stream.
///
/// **Not `Send`**: `cpal::Stream` is bound to its creation thread on
/// Windows/macOS. Create and drop this type on the same OS thread.
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    stream: Stream,
    /// Capture sample rate negotiated with the device (Hz).
    pub sample_rate: u32,
    /// Human-readable device name reported by the OS.
    pub device_name: String,
}

#[cfg(feature = "audio-cpal")]
impl AudioCapture {
    /// Open an input device by preferred name, otherwise fall back to the
    /// default input device and then the first available device.
    ///
    /// The stream is configured for interleaved stereo at `sample_rate` and
    /// starts playing before this returns.
    ///
    /// # Errors
    /// - `SpectraError::NoDefaultInputDevice` when no input exists at all.
    /// - `SpectraError::AudioDevice` when the device has no stereo
    ///   configuration at `sample_rate`.
    /// - `SpectraError::AudioStream` if cpal fails to build or start the stream.
    pub fn open_with_preference(
        handle: CaptureHandle,
        preferred_device_name: Option<&str>,
        sample_rate: u32,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let device = select_device(&host, preferred_device_name)?;
        let device_name = device.name().unwrap_or_default();

        info!(device = device_name.as_str(), "opening input device");

        let supported = stereo_config(&device, sample_rate)?;
        let config = supported.config();

        info!(
            sample_rate,
            channels = config.channels,
            format = ?supported.sample_format(),
            "audio config selected"
        );

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _info| handle.push_interleaved(data),
                |err| error!("audio stream error: {err}"),
                None,
            ),

            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _info| {
                    handle.push_interleaved_with(data, |s| s as f32 / 32768.0)
                },
                |err| error!("audio stream error: {err}"),
                None,
            ),

            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _info| {
                    handle.push_interleaved_with(data, |s| (s as f32 - 32768.0) / 32768.0)
                },
                |err| error!("audio stream error: {err}"),
                None,
            ),

            fmt => {
                return Err(SpectraError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| SpectraError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| SpectraError::AudioStream(e.to_string()))?;

        Ok(Self {
            stream,
            sample_rate,
            device_name,
        })
    }

    /// Pause the stream; the callback stops firing.
    pub fn stop(&self) {
        if let Err(e) = self.stream.pause() {
            warn!(device = self.device_name.as_str(), "failed to pause stream: {e}");
        }
    }
}

#[cfg(feature = "audio-cpal")]
fn select_device(host: &cpal::Host, preferred_name: Option<&str>) -> Result<cpal::Device> {
    if let Some(preferred_name) = preferred_name {
        match host.input_devices() {
            Ok(mut devices) => {
                let found = devices.find(|device| {
                    device
                        .name()
                        .map(|name| name == preferred_name)
                        .unwrap_or(false)
                });
                if let Some(device) = found {
                    return Ok(device);
                }
                warn!(
                    "preferred input device '{}' not found, falling back",
                    preferred_name
                );
            }
            Err(e) => {
                warn!("failed to list input devices while resolving preference: {e}");
            }
        }
    }

    if let Some(default) = host.default_input_device() {
        return Ok(default);
    }

    let mut devices = host
        .input_devices()
        .map_err(|e| SpectraError::AudioDevice(e.to_string()))?;
    let fallback = devices.next().ok_or(SpectraError::NoDefaultInputDevice)?;
    warn!("no default input device, falling back to first available input");
    Ok(fallback)
}

/// Pick a stereo configuration at `sample_rate`, preferring `f32` samples.
#[cfg(feature = "audio-cpal")]
fn stereo_config(device: &cpal::Device, sample_rate: u32) -> Result<SupportedStreamConfig> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| SpectraError::AudioDevice(e.to_string()))?;

    let rate = SampleRate(sample_rate);
    ranges
        .filter(|range| {
            range.channels() as usize == CHANNEL_COUNT
                && range.min_sample_rate() <= rate
                && rate <= range.max_sample_rate()
                && format_rank(range.sample_format()).is_some()
        })
        .min_by_key(|range| format_rank(range.sample_format()))
        .map(|range| range.with_sample_rate(rate))
        .ok_or_else(|| {
            SpectraError::AudioDevice(format!(
                "device has no {CHANNEL_COUNT}-channel input at {sample_rate} Hz"
            ))
        })
}

#[cfg(feature = "audio-cpal")]
fn format_rank(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::F32 => Some(0),
        SampleFormat::I16 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open_with_preference(
        _handle: CaptureHandle,
        _preferred_device_name: Option<&str>,
        _sample_rate: u32,
    ) -> Result<Self> {
        Err(SpectraError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    pub fn stop(&self) {}
}
