// Demuxing audio formats using Symphonia

use crate::fetch::fetch_url;
use crate::{mime, DemuxerFactory, SeekMode, SourceDemuxer, TrackFormat};
use std::fs::File;
use std::io::Cursor;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{self, FormatOptions, FormatReader, Packet, SeekTo, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tonearm_core::{AudioError, DataSource, Result};

/// Audio demuxer wrapper
pub struct SymphoniaDemuxer {
    format_reader: Box<dyn FormatReader>,
    track_id: u32,
    time_base: Option<TimeBase>,
    byte_len: Option<u64>,
    current: Option<Packet>,
    exhausted: bool,
}

impl SymphoniaDemuxer {
    /// Open a data source, fetching URLs into memory first
    pub fn open(source: &DataSource) -> Result<Self> {
        let media_source: Box<dyn MediaSource> = match source {
            DataSource::Path(path) => {
                let file = File::open(path).map_err(|e| {
                    AudioError::OpenError(format!("open file {}: {}", path.display(), e))
                })?;
                Box::new(file)
            }
            DataSource::Url(url) => {
                let body = fetch_url(url).map_err(|e| AudioError::OpenError(e.to_string()))?;
                Box::new(Cursor::new(body))
            }
            DataSource::Resource { bytes, .. } => Box::new(Cursor::new(bytes.clone())),
        };

        let mut hint = Hint::new();
        if let Some(extension) = source.extension_hint() {
            hint.with_extension(&extension);
        }

        Self::from_media_source(media_source, hint)
    }

    /// Create demuxer from a media source
    pub fn from_media_source(media_source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let byte_len = media_source.byte_len();
        let media_source_stream = MediaSourceStream::new(media_source, Default::default());

        // Probe the media source
        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                media_source_stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::OpenError(format!("Failed to probe media: {}", e)))?;

        let format_reader = probe_result.format;

        // Prefer the default track, fall back to the first one
        let track = format_reader
            .default_track()
            .or_else(|| format_reader.tracks().first())
            .ok_or_else(|| AudioError::FormatError("No tracks found".to_string()))?;

        let track_id = track.id;
        let time_base = track.codec_params.time_base.or_else(|| {
            track
                .codec_params
                .sample_rate
                .map(|rate| TimeBase::new(1, rate))
        });

        log::debug!(
            "Opened container with {} track(s), selected track {}",
            format_reader.tracks().len(),
            track_id
        );

        Ok(Self {
            format_reader,
            track_id,
            time_base,
            byte_len,
            current: None,
            exhausted: false,
        })
    }

    /// Get track ID
    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    fn track(&self) -> Option<&Track> {
        self.format_reader
            .tracks()
            .iter()
            .find(|t| t.id == self.track_id)
    }

    fn ts_to_us(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) => time_to_us(tb.calc_time(ts)),
            None => 0,
        }
    }

    /// Make sure `current` holds the next packet of our track
    fn load_current(&mut self) -> bool {
        if self.current.is_some() {
            return true;
        }
        if self.exhausted {
            return false;
        }

        loop {
            match self.format_reader.next_packet() {
                // Only keep packets for our track
                Ok(packet) if packet.track_id() == self.track_id => {
                    self.current = Some(packet);
                    return true;
                }
                Ok(_) => continue,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    log::debug!("Demuxer reached end of stream");
                }
                Err(SymphoniaError::ResetRequired) => {
                    log::warn!("Track list changed mid-stream, ending input");
                }
                Err(e) => {
                    log::warn!("Failed to read packet, ending input: {}", e);
                }
            }
            self.exhausted = true;
            return false;
        }
    }
}

fn time_to_us(time: Time) -> u64 {
    time.seconds * 1_000_000 + (time.frac * 1_000_000.0) as u64
}

fn us_to_time(position_us: u64) -> Time {
    Time::new(
        position_us / 1_000_000,
        (position_us % 1_000_000) as f64 / 1_000_000.0,
    )
}

/// Declared format of `track`, estimating bit rate from the byte length
fn describe_track(track: &Track, byte_len: Option<u64>) -> TrackFormat {
    let params = &track.codec_params;

    let duration_us = params.n_frames.and_then(|n_frames| match params.time_base {
        Some(tb) => Some(time_to_us(tb.calc_time(n_frames))),
        None => params
            .sample_rate
            .filter(|rate| *rate > 0)
            .map(|rate| n_frames * 1_000_000 / rate as u64),
    });

    let bit_rate = match (byte_len, duration_us) {
        (Some(bytes), Some(us)) if us > 0 => Some((bytes * 8 * 1_000_000 / us) as u32),
        _ => None,
    };

    TrackFormat {
        mime: mime::mime_for_codec(params.codec).map(str::to_string),
        sample_rate: params.sample_rate,
        channels: params.channels.map(|c| c.count() as u16),
        bit_rate,
        duration_us,
        codec_params: Some(params.clone()),
    }
}

impl SourceDemuxer for SymphoniaDemuxer {
    fn track_format(&self) -> Result<TrackFormat> {
        let track = self
            .track()
            .ok_or_else(|| AudioError::FormatError("Track not found".to_string()))?;
        Ok(describe_track(track, self.byte_len))
    }

    fn read_sample_data(&mut self, buf: &mut Vec<u8>) -> Option<usize> {
        if !self.load_current() {
            return None;
        }
        let packet = self.current.as_ref()?;
        buf.clear();
        buf.extend_from_slice(packet.buf());
        Some(buf.len())
    }

    fn sample_time(&self) -> Option<u64> {
        self.current.as_ref().map(|p| self.ts_to_us(p.ts()))
    }

    fn advance(&mut self) -> bool {
        self.current = None;
        self.load_current()
    }

    fn seek_to(&mut self, position_us: u64, mode: SeekMode) -> Result<u64> {
        let mode = match mode {
            SeekMode::ClosestSync => formats::SeekMode::Coarse,
            SeekMode::Accurate => formats::SeekMode::Accurate,
        };

        let seeked = self
            .format_reader
            .seek(
                mode,
                SeekTo::Time {
                    time: us_to_time(position_us),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| AudioError::Other(format!("Seek failed: {}", e)))?;

        self.current = None;
        self.exhausted = false;
        let reached = self.ts_to_us(seeked.actual_ts);
        log::debug!("Demuxer seek {} us -> {} us", position_us, reached);
        Ok(reached)
    }
}

/// Factory for [`SymphoniaDemuxer`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDemuxerFactory;

impl DemuxerFactory for SymphoniaDemuxerFactory {
    fn open(&self, source: &DataSource) -> Result<Box<dyn SourceDemuxer>> {
        Ok(Box::new(SymphoniaDemuxer::open(source)?))
    }
}
