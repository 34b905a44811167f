// Audio output abstraction layer

mod clocked_sink;
mod cpal_sink;

pub use clocked_sink::{ClockedSink, ClockedSinkFactory};
pub use cpal_sink::{CpalSink, CpalSinkFactory};

use tonearm_core::{AudioError, Result};

/// Audio buffered by a sink at minimum
pub const MIN_BUFFER_MS: u32 = 80;

/// Floor for any sink buffer
pub const MIN_BUFFER_BYTES: usize = 4096;

/// Output channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    /// Mono for a single channel, stereo for anything else
    pub fn from_channels(channels: u16) -> Self {
        if channels == 1 {
            ChannelLayout::Mono
        } else {
            ChannelLayout::Stereo
        }
    }

    pub fn channel_count(&self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Sample encoding accepted by sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmEncoding {
    /// Signed 16-bit little-endian
    Pcm16Bit,
}

impl PcmEncoding {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PcmEncoding::Pcm16Bit => 2,
        }
    }
}

/// Format and buffering for a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSpec {
    pub sample_rate: u32,
    pub layout: ChannelLayout,
    pub encoding: PcmEncoding,
    pub buffer_size_bytes: usize,
}

impl SinkSpec {
    pub fn frame_bytes(&self) -> usize {
        self.layout.channel_count() as usize * self.encoding.bytes_per_sample()
    }

    /// Bytes consumed per second of playback
    pub fn byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.frame_bytes() as u64
    }
}

/// Smallest buffer that holds [`MIN_BUFFER_MS`] of audio, in whole frames
pub fn min_buffer_size(
    sample_rate: u32,
    layout: ChannelLayout,
    encoding: PcmEncoding,
) -> Result<usize> {
    if sample_rate == 0 {
        return Err(AudioError::DeviceError(
            "Cannot size a buffer for sample rate 0".to_string(),
        ));
    }

    let frame_bytes = layout.channel_count() as usize * encoding.bytes_per_sample();
    let frames = (sample_rate as usize * MIN_BUFFER_MS as usize).div_ceil(1000);
    Ok((frames * frame_bytes).max(MIN_BUFFER_BYTES))
}

/// PCM output with a blocking write
///
/// Sinks are created and driven on the engine thread.
pub trait AudioSink {
    /// Start consuming written audio
    fn play(&mut self) -> Result<()>;

    /// Write PCM bytes, blocking until the sink has taken them.
    /// Returns the bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Discard buffered audio
    fn flush(&mut self);

    /// Free the output; further writes fail
    fn release(&mut self);
}

/// Creates sinks for a given format
pub trait AudioSinkFactory: Send + Sync {
    fn min_buffer_size(
        &self,
        sample_rate: u32,
        layout: ChannelLayout,
        encoding: PcmEncoding,
    ) -> Result<usize> {
        min_buffer_size(sample_rate, layout, encoding)
    }

    fn create_sink(&self, spec: SinkSpec) -> Result<Box<dyn AudioSink>>;
}
