// Decoding: queue-protocol decoder capability and buffer types

mod symphonia_decoder;

pub use symphonia_decoder::{list_codecs, CodecInfo, SymphoniaDecoder, SymphoniaDecoderFactory};

use std::time::Duration;
use tonearm_core::Result;
use tonearm_demux::TrackFormat;

/// PCM format of decoded output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    /// Bytes per interleaved 16-bit frame
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * 2
    }
}

/// Free input slot handed out by [`Decoder::dequeue_input_buffer`]
#[derive(Debug)]
pub struct InputBuffer {
    index: usize,
    data: Vec<u8>,
}

impl InputBuffer {
    pub fn new(index: usize, data: Vec<u8>) -> Self {
        Self { index, data }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Backing storage to read an access unit into
    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Metadata for a decoded output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferInfo {
    /// Valid bytes in the buffer
    pub size: usize,
    pub presentation_time_us: u64,
    pub end_of_stream: bool,
}

/// Decoded PCM (interleaved signed 16-bit little-endian)
#[derive(Debug)]
pub struct OutputBuffer {
    index: usize,
    info: BufferInfo,
    data: Vec<u8>,
}

impl OutputBuffer {
    pub fn new(index: usize, info: BufferInfo, data: Vec<u8>) -> Self {
        Self { index, info, data }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn info(&self) -> BufferInfo {
        self.info
    }

    /// The valid bytes of the buffer
    pub fn data(&self) -> &[u8] {
        let size = self.info.size.min(self.data.len());
        &self.data[..size]
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Result of polling the output queue
#[derive(Debug)]
pub enum OutputStatus {
    Buffer(OutputBuffer),
    /// The output buffer pool was reallocated; refresh with [`Decoder::output_buffers`]
    BuffersChanged,
    /// Output format differs from the configured one
    FormatChanged(PcmFormat),
    /// Nothing available within the timeout
    TryAgainLater,
}

/// Snapshot of the decoder's output buffer pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputBufferView {
    pub count: usize,
    pub slot_capacity: usize,
    /// Bumped on every reallocation
    pub generation: u32,
}

/// Stateful compressed-to-PCM transform with separate input and output queues
///
/// The protocol mirrors platform codecs: free input slots are dequeued, filled
/// and queued back; decoded buffers are dequeued, consumed and released. The
/// engine thread is the only caller.
pub trait Decoder {
    fn name(&self) -> &str;

    /// Prepare for the given track; must precede [`Decoder::start`]
    fn configure(&mut self, format: &TrackFormat) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    /// A free input slot, or `None` if none became free within `timeout`
    fn dequeue_input_buffer(&mut self, timeout: Duration) -> Option<InputBuffer>;

    /// Submit `size` bytes of `buffer`. `end_of_stream` marks the last input.
    fn queue_input_buffer(
        &mut self,
        buffer: InputBuffer,
        size: usize,
        presentation_time_us: u64,
        end_of_stream: bool,
    ) -> Result<()>;

    /// Poll the output queue, waiting at most `timeout`
    fn dequeue_output_buffer(&mut self, timeout: Duration) -> Result<OutputStatus>;

    /// Hand a consumed output buffer back to the pool
    fn release_output_buffer(&mut self, buffer: OutputBuffer);

    fn output_buffers(&self) -> OutputBufferView;

    /// Current output format, once configured
    fn output_format(&self) -> Option<PcmFormat>;

    /// Drop all queued input and output, clearing end-of-stream state
    fn flush(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Free codec resources; the decoder is unusable afterwards
    fn release(&mut self);
}

/// Creates decoders by mime type
pub trait DecoderFactory: Send + Sync {
    fn create_decoder_by_type(&self, mime: &str) -> Result<Box<dyn Decoder>>;
}
