//! Microphone capture via cpal.
//!
//! Capture sits behind the [`AudioCapture`] trait so the session machine
//! can be driven with a scripted device in tests. A capture cycle is
//! open → stop → finalize; `finalize` consumes the buffered samples exactly
//! once and `close` releases the stream on any exit path, repeatedly if
//! needed.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Microphone access refused or the device vanished. Fatal to the
    /// recording attempt only; the rest of the session stays usable.
    #[error("microphone access denied")]
    PermissionDenied,

    #[error("no input device available")]
    NoDevice,

    #[error("capture already running")]
    AlreadyRecording,

    #[error("capture not running")]
    NotRecording,

    #[error("no finished capture to finalize")]
    NotStopped,

    #[error("no audio captured")]
    NothingCaptured,

    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Finalized audio artifact: a complete in-memory WAV clip.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub wav: Vec<u8>,
    pub sample_rate: u32,
}

impl AudioClip {
    /// Encode captured mono f32 samples as a WAV container.
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Result<Self, CaptureError> {
        if samples.is_empty() {
            return Err(CaptureError::NothingCaptured);
        }

        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)
                .map_err(|e| CaptureError::Stream(e.to_string()))?;
            for &sample in samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| CaptureError::Stream(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| CaptureError::Stream(e.to_string()))?;
        }

        Ok(Self {
            wav: cursor.into_inner(),
            sample_rate,
        })
    }
}

/// A microphone-like capture device.
pub trait AudioCapture {
    /// Acquire the device and start buffering samples.
    fn open(&mut self) -> Result<(), CaptureError>;

    /// Stop capturing. The buffered samples stay available for `finalize`.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Consume the buffered samples into a finalized clip. Only valid after
    /// `stop`; a second call fails because the buffer was taken.
    fn finalize(&mut self) -> Result<AudioClip, CaptureError>;

    /// Release the device and discard any buffered samples. Idempotent.
    fn close(&mut self);

    fn is_active(&self) -> bool;
}

/// cpal-backed default input device capture.
pub struct MicCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    samples: Arc<Mutex<Vec<f32>>>,
    stream: Option<cpal::Stream>,
    active: bool,
    stopped: bool,
    sample_rate: u32,
}

impl MicCapture {
    pub fn new(sample_rate: u32) -> Result<Self, CaptureError> {
        use cpal::traits::{DeviceTrait, HostTrait};

        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            device,
            config,
            samples: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            active: false,
            stopped: false,
            sample_rate,
        })
    }
}

impl AudioCapture for MicCapture {
    fn open(&mut self) -> Result<(), CaptureError> {
        use cpal::traits::{DeviceTrait, StreamTrait};

        if self.active {
            return Err(CaptureError::AlreadyRecording);
        }

        {
            let mut samples = self.samples.lock().unwrap();
            samples.clear();
            samples.shrink_to_fit();
        }

        let samples_clone = self.samples.clone();
        let err_fn = |err| error!("Mic stream error: {}", err);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut samples) = samples_clone.lock() {
                        samples.extend_from_slice(data);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => CaptureError::PermissionDenied,
                other => CaptureError::Stream(other.to_string()),
            })?;

        stream
            .play()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        self.stream = Some(stream);
        self.active = true;
        self.stopped = false;

        info!("Mic recording started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.active {
            return Err(CaptureError::NotRecording);
        }

        if let Some(stream) = self.stream.take() {
            debug!("Stopping mic stream");
            drop(stream);
        }

        self.active = false;
        self.stopped = true;

        let captured = self.samples.lock().unwrap().len();
        info!("Mic stopped, {} samples captured", captured);
        Ok(())
    }

    fn finalize(&mut self) -> Result<AudioClip, CaptureError> {
        if self.active || !self.stopped {
            return Err(CaptureError::NotStopped);
        }
        self.stopped = false;

        let samples = {
            let mut guard = self.samples.lock().unwrap();
            std::mem::take(&mut *guard)
        };

        AudioClip::from_samples(&samples, self.sample_rate)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
        self.active = false;
        self.stopped = false;
        let mut samples = self.samples.lock().unwrap();
        samples.clear();
        samples.shrink_to_fit();
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        if self.active {
            debug!("Dropping active MicCapture, cleaning up");
        }
        self.close();
    }
}
