//! Audio device output using cpal.

use super::{BlockOutcome, CallbackFlags, OutputBackend, OutputStream, StreamCallback, StreamParams};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, Sample, SizedSample, Stream, StreamConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use swanlake_core::{Error, Result, SampleFormat};
use tracing::{debug, error, info};

/// Device sample types a PCM sample format is played through.
trait DeviceSample: SizedSample + Send + 'static {
    fn from_pcm(format: SampleFormat, raw: &[u8]) -> Self;
}

impl DeviceSample for i8 {
    fn from_pcm(format: SampleFormat, raw: &[u8]) -> Self {
        format.decode(raw) as Self
    }
}

impl DeviceSample for i16 {
    fn from_pcm(format: SampleFormat, raw: &[u8]) -> Self {
        format.decode(raw) as Self
    }
}

impl DeviceSample for i32 {
    fn from_pcm(format: SampleFormat, raw: &[u8]) -> Self {
        match format {
            // Left-align 24-bit samples in the 32-bit container.
            SampleFormat::I24 => format.decode(raw) << 8,
            _ => format.decode(raw),
        }
    }
}

/// Opens streams on the default output device.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub const fn new() -> Self {
        Self
    }
}

impl OutputBackend for CpalBackend {
    type Stream = CpalStream;

    fn open(&self, params: StreamParams, callback: Arc<dyn StreamCallback>) -> Result<CpalStream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Stream("No output device found".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio output device: {device_name}");

        let config = StreamConfig {
            channels: params.channels,
            sample_rate: cpal::SampleRate(params.frame_rate),
            buffer_size: cpal::BufferSize::Fixed(params.block_size as u32),
        };
        debug!("Output config: {config:?}, {:?}", params.sample_format);

        let active = Arc::new(AtomicBool::new(false));
        let stream = match params.sample_format {
            SampleFormat::I8 => {
                build_stream::<i8>(&device, &config, params, callback.clone(), active.clone())?
            }
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, params, callback.clone(), active.clone())?
            }
            SampleFormat::I24 | SampleFormat::I32 => {
                build_stream::<i32>(&device, &config, params, callback.clone(), active.clone())?
            }
        };

        // Streams may start running as soon as they are built on some hosts.
        stream
            .pause()
            .map_err(|e| Error::Stream(format!("Failed to pause new stream: {e}")))?;

        Ok(CpalStream {
            stream,
            callback,
            active,
            stopped: true,
            device_name,
        })
    }
}

fn build_stream<T: DeviceSample>(
    device: &Device,
    config: &StreamConfig,
    params: StreamParams,
    callback: Arc<dyn StreamCallback>,
    active: Arc<AtomicBool>,
) -> Result<Stream> {
    let channels = usize::from(params.channels);
    let width = params.sample_format.width();
    let frame_size = params.frame_size();
    let format = params.sample_format;
    // Allocated once; the device may ask for fewer frames but never more per chunk.
    let mut scratch = vec![0u8; params.block_bytes()];

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], info: &cpal::OutputCallbackInfo| {
                let timestamp = info.timestamp();
                let late = timestamp.playback.duration_since(&timestamp.callback).is_none();

                for chunk in data.chunks_mut(params.block_size * channels) {
                    if !active.load(Ordering::Acquire) {
                        chunk.fill(T::EQUILIBRIUM);
                        continue;
                    }

                    let bytes = &mut scratch[..chunk.len() / channels * frame_size];
                    let outcome = callback.fill_block(
                        bytes,
                        CallbackFlags {
                            output_underflow: late,
                        },
                    );
                    for (sample, raw) in chunk.iter_mut().zip(bytes.chunks_exact(width)) {
                        *sample = T::from_pcm(format, raw);
                    }

                    if outcome == BlockOutcome::Complete && active.swap(false, Ordering::AcqRel) {
                        callback.finished();
                    }
                }
            },
            |err| {
                error!("Audio stream error: {err}");
            },
            None,
        )
        .map_err(|e| Error::Stream(format!("Failed to build stream: {e}")))?;

    Ok(stream)
}

/// A cpal output stream.
///
/// cpal streams cannot signal completion themselves, so a completed stream
/// keeps running and writes silence until it is stopped or aborted.
pub struct CpalStream {
    stream: Stream,
    callback: Arc<dyn StreamCallback>,
    active: Arc<AtomicBool>,
    stopped: bool,
    device_name: String,
}

impl CpalStream {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn halt(&mut self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| Error::Stream(format!("Failed to stop stream: {e}")))?;
        self.stopped = true;
        if self.active.swap(false, Ordering::AcqRel) {
            self.callback.finished();
        }
        Ok(())
    }
}

impl OutputStream for CpalStream {
    fn start(&mut self) -> Result<()> {
        if !self.stopped {
            return Err(Error::Stream(
                "Stream must be stopped before it can start".to_string(),
            ));
        }
        self.active.store(true, Ordering::Release);
        if let Err(e) = self.stream.play() {
            self.active.store(false, Ordering::Release);
            return Err(Error::Stream(format!("Failed to start stream: {e}")));
        }
        self.stopped = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.halt()
    }

    fn abort(&mut self) -> Result<()> {
        self.halt()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }
}
