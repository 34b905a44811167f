// Demuxing: source open, declared track format and access-unit reading

mod fetch;
pub mod mime;
mod symphonia_demuxer;

pub use fetch::fetch_url;
pub use symphonia_demuxer::{SymphoniaDemuxer, SymphoniaDemuxerFactory};

use symphonia::core::codecs::CodecParameters;
use tonearm_core::{DataSource, MediaDescriptor, Result};

/// Seek precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Land on the sync point nearest the target
    ClosestSync,
    /// Land exactly on the target
    Accurate,
}

/// Format declared by the container for the selected track
///
/// Every field is optional: containers routinely omit some of them and the
/// engine decides which absences are fatal.
#[derive(Debug, Clone, Default)]
pub struct TrackFormat {
    pub mime: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub bit_rate: Option<u32>,
    pub duration_us: Option<u64>,
    /// Parameters a decoder needs to configure itself
    pub codec_params: Option<CodecParameters>,
}

impl TrackFormat {
    /// True when the track carries a mime type in the `audio/` family
    pub fn is_audio(&self) -> bool {
        self.mime
            .as_deref()
            .map(|m| m.starts_with("audio/"))
            .unwrap_or(false)
    }

    /// Descriptor with missing numeric fields defaulted to 0.
    /// `None` when no mime type was declared.
    pub fn descriptor(&self) -> Option<MediaDescriptor> {
        Some(MediaDescriptor {
            mime: self.mime.clone()?,
            sample_rate: self.sample_rate.unwrap_or(0),
            channels: self.channels.unwrap_or(0),
            bit_rate: self.bit_rate.unwrap_or(0),
            duration_us: self.duration_us.unwrap_or(0),
        })
    }
}

/// Demuxer capability, driven by the engine thread only
///
/// Reading follows a cursor model: `read_sample_data` and `sample_time` look at
/// the current access unit, `advance` moves to the next one.
pub trait SourceDemuxer {
    /// Format of the selected track
    fn track_format(&self) -> Result<TrackFormat>;

    /// Copy the current access unit into `buf`, replacing its contents.
    /// Returns `None` once the stream is exhausted.
    fn read_sample_data(&mut self, buf: &mut Vec<u8>) -> Option<usize>;

    /// Presentation time of the current access unit in microseconds
    fn sample_time(&self) -> Option<u64>;

    /// Move to the next access unit; false at end of stream
    fn advance(&mut self) -> bool;

    /// Reposition the cursor; returns the position actually reached (µs)
    fn seek_to(&mut self, position_us: u64, mode: SeekMode) -> Result<u64>;
}

/// Opens demuxers for data sources
pub trait DemuxerFactory: Send + Sync {
    fn open(&self, source: &DataSource) -> Result<Box<dyn SourceDemuxer>>;
}
