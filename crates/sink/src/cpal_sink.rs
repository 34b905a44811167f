// cpal-based audio sink

use crate::{AudioSink, AudioSinkFactory, SinkSpec};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tonearm_core::{AudioError, Result};
use tonearm_ringbuffer::SharedPcmRing;

/// A write that frees no ring space for this long means the device is gone
const WRITE_STALL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default output device fed from a blocking PCM ring
pub struct CpalSink {
    stream: Option<Stream>,
    ring: SharedPcmRing,
    is_playing: Arc<AtomicBool>,
    spec: SinkSpec,
    samples: Vec<i16>,
}

impl CpalSink {
    pub fn new(spec: SinkSpec) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceError("No output device available".to_string()))?;

        let config = StreamConfig {
            channels: spec.layout.channel_count(),
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // Ring capacity in samples, one slot is always kept free
        let ring = SharedPcmRing::new(spec.buffer_size_bytes / spec.encoding.bytes_per_sample() + 1);
        let is_playing = Arc::new(AtomicBool::new(false));

        let ring_clone = ring.clone();
        let is_playing_clone = is_playing.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !is_playing_clone.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    // Zero-fills whatever the ring cannot supply
                    ring_clone.read_f32(data);
                },
                |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::DeviceError(format!("Failed to build output stream: {}", e)))?;

        log::info!(
            "Opened output device: {} Hz, {:?}, {} byte buffer",
            spec.sample_rate,
            spec.layout,
            spec.buffer_size_bytes
        );

        Ok(Self {
            stream: Some(stream),
            ring,
            is_playing,
            spec,
            samples: Vec::new(),
        })
    }

    pub fn spec(&self) -> SinkSpec {
        self.spec
    }
}

impl AudioSink for CpalSink {
    fn play(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| AudioError::DeviceError("Sink already released".to_string()))?;
        stream
            .play()
            .map_err(|e| AudioError::DeviceError(format!("Failed to start stream: {}", e)))?;
        self.is_playing.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.stream.is_none() {
            return Err(AudioError::DeviceError("Sink already released".to_string()));
        }

        self.samples.clear();
        self.samples.extend(
            data.chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
        );

        let written = self.ring.write_blocking(&self.samples, WRITE_STALL_TIMEOUT);
        if written == 0 && !self.samples.is_empty() {
            return Err(AudioError::DeviceError(
                "Output device stopped consuming audio".to_string(),
            ));
        }
        Ok(written * 2)
    }

    fn flush(&mut self) {
        self.ring.clear();
    }

    fn release(&mut self) {
        self.is_playing.store(false, Ordering::Relaxed);
        self.ring.close();
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause stream on release: {}", e);
            }
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.release();
    }
}

/// Factory for [`CpalSink`] on the host's default output device
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalSinkFactory;

impl AudioSinkFactory for CpalSinkFactory {
    fn create_sink(&self, spec: SinkSpec) -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(CpalSink::new(spec)?))
    }
}
