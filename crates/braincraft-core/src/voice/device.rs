//! Real audio devices: cpal for the microphone, rodio for playback.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use std::sync::Arc;

use super::{AudioCapture, AudioPlayback, CapturedAudio};
use crate::error::DeviceError;
use crate::logger::Logger;
use crate::voice::wav::encode_wav;

fn device_error(context: &str, e: impl std::fmt::Display) -> DeviceError {
    let message = format!("{}: {}", context, e);
    if message.to_lowercase().contains("permission") {
        DeviceError::PermissionDenied(message)
    } else {
        DeviceError::Stream(message)
    }
}

/// Records the default input device into memory, mixed down to mono
pub struct CpalCapture {
    stream: Option<Stream>,
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
    logger: Logger,
}

impl CpalCapture {
    pub fn new(logger: Logger) -> Self {
        Self {
            stream: None,
            samples: Arc::new(Mutex::new(Vec::new())),
            sample_rate: 16000,
            logger,
        }
    }

    fn build_stream(&mut self) -> Result<Stream, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| DeviceError::Unavailable("No input device available".to_string()))?;

        self.logger.info(&format!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        ));

        let supported = device
            .default_input_config()
            .map_err(|e| device_error("Failed to get input config", e))?;
        let format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let channels = config.channels.max(1) as usize;
        self.sample_rate = config.sample_rate.0;

        let logger = self.logger.clone();
        let err_fn = move |err: cpal::StreamError| {
            logger.error(&format!("Audio input stream error: {}", err));
        };

        let stream = match format {
            SampleFormat::F32 => {
                let samples = Arc::clone(&self.samples);
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let mut buf = samples.lock();
                        buf.extend(data.chunks(channels).map(|frame| frame.iter().sum::<f32>() / channels as f32));
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let samples = Arc::clone(&self.samples);
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let mut buf = samples.lock();
                        buf.extend(data.chunks(channels).map(|frame| {
                            frame.iter().map(|&s| s as f32 / i16::MAX as f32).sum::<f32>() / channels as f32
                        }));
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(DeviceError::Unavailable(format!("Unsupported sample format: {:?}", other)));
            }
        }
        .map_err(|e| device_error("Failed to build input stream", e))?;

        Ok(stream)
    }
}

impl AudioCapture for CpalCapture {
    fn start(&mut self) -> Result<(), DeviceError> {
        if self.stream.is_some() {
            self.logger.warn("Already recording");
            return Ok(());
        }

        self.samples.lock().clear();
        let stream = self.build_stream()?;
        stream
            .play()
            .map_err(|e| device_error("Failed to start input stream", e))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) -> Result<CapturedAudio, DeviceError> {
        // Dropping the stream releases the microphone
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }

        let samples = std::mem::take(&mut *self.samples.lock());
        if samples.is_empty() {
            return Ok(CapturedAudio {
                bytes: Vec::new(),
                mime: "audio/wav",
            });
        }

        self.logger.debug(&format!("Captured {} samples at {} Hz", samples.len(), self.sample_rate));
        Ok(CapturedAudio {
            bytes: encode_wav(&samples, self.sample_rate)?,
            mime: "audio/wav",
        })
    }

    fn is_recording(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.stream.take();
    }
}

/// Plays encoded audio (mp3, wav) on the default output device
pub struct RodioPlayback {
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
    logger: Logger,
}

impl RodioPlayback {
    pub fn new(logger: Logger) -> Self {
        Self {
            output: None,
            sink: None,
            logger,
        }
    }

    fn handle(&mut self) -> Result<&OutputStreamHandle, DeviceError> {
        if self.output.is_none() {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| DeviceError::Unavailable(format!("No output device available: {}", e)))?;
            self.output = Some((stream, handle));
        }
        match &self.output {
            Some((_, handle)) => Ok(handle),
            None => Err(DeviceError::Unavailable("No output device available".to_string())),
        }
    }
}

impl AudioPlayback for RodioPlayback {
    fn play(&mut self, audio: Vec<u8>) -> Result<(), DeviceError> {
        self.stop();

        let source = Decoder::new(Cursor::new(audio))
            .map_err(|e| DeviceError::Decode(format!("Unsupported audio: {}", e)))?;
        let sink = Sink::try_new(self.handle()?).map_err(|e| device_error("Failed to open output", e))?;
        sink.append(source);
        self.sink = Some(sink);
        self.logger.debug("Playback started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn is_playing(&self) -> bool {
        self.sink.as_ref().map(|s| !s.empty()).unwrap_or(false)
    }
}
