// Queue-protocol decoder on top of Symphonia codecs

use crate::{
    BufferInfo, Decoder, DecoderFactory, InputBuffer, OutputBuffer, OutputBufferView,
    OutputStatus, PcmFormat,
};
use std::collections::VecDeque;
use std::time::Duration;
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{self, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use symphonia::core::units::TimeBase;
use tonearm_core::{AudioError, Result};
use tonearm_demux::{mime, TrackFormat};

/// Input slots in the pool
pub const INPUT_SLOTS: usize = 4;

/// Output buffers the pool advertises
pub const OUTPUT_SLOTS: usize = 8;

/// Initial output slot capacity in bytes
pub const DEFAULT_SLOT_CAPACITY: usize = 8192;

/// Output is never wider than stereo
const MAX_OUTPUT_CHANNELS: usize = 2;

struct PendingInput {
    index: usize,
    data: Vec<u8>,
    presentation_time_us: u64,
    end_of_stream: bool,
}

/// Symphonia-backed decoder
///
/// Input is decoded on demand while the output queue is polled, so input
/// slots only become free again during [`Decoder::dequeue_output_buffer`].
pub struct SymphoniaDecoder {
    name: String,
    codec: Option<Box<dyn codecs::Decoder>>,
    time_base: Option<TimeBase>,
    format: Option<PcmFormat>,
    started: bool,
    free_inputs: VecDeque<usize>,
    spare_storage: Vec<Vec<u8>>,
    pending: VecDeque<PendingInput>,
    status_queue: VecDeque<OutputStatus>,
    next_output_index: usize,
    slot_capacity: usize,
    generation: u32,
    input_eos_queued: bool,
    output_eos_sent: bool,
}

impl SymphoniaDecoder {
    pub fn new(mime: &str) -> Self {
        Self::with_slot_capacity(mime, DEFAULT_SLOT_CAPACITY)
    }

    /// Decoder whose output pool starts at `slot_capacity` bytes per buffer
    pub fn with_slot_capacity(mime: &str, slot_capacity: usize) -> Self {
        Self {
            name: format!("symphonia:{}", mime),
            codec: None,
            time_base: None,
            format: None,
            started: false,
            free_inputs: (0..INPUT_SLOTS).collect(),
            spare_storage: Vec::new(),
            pending: VecDeque::new(),
            status_queue: VecDeque::new(),
            next_output_index: 0,
            slot_capacity: slot_capacity.max(1),
            generation: 0,
            input_eos_queued: false,
            output_eos_sent: false,
        }
    }

    fn reset_queues(&mut self) {
        self.pending.clear();
        self.status_queue.clear();
        self.free_inputs = (0..INPUT_SLOTS).collect();
        self.input_eos_queued = false;
        self.output_eos_sent = false;
    }

    fn to_timestamp(&self, presentation_time_us: u64) -> u64 {
        match self.time_base {
            Some(tb) if tb.numer > 0 => {
                presentation_time_us * tb.denom as u64 / (tb.numer as u64 * 1_000_000)
            }
            _ => 0,
        }
    }

    fn next_index(&mut self) -> usize {
        let index = self.next_output_index;
        self.next_output_index = (self.next_output_index + 1) % OUTPUT_SLOTS;
        index
    }

    /// Decode pending input until some status is queued or input runs out
    fn pump_pending(&mut self) -> Result<()> {
        while self.status_queue.is_empty() {
            let Some(input) = self.pending.pop_front() else {
                break;
            };

            let decoded = if input.data.is_empty() {
                Ok(())
            } else {
                self.decode_input(&input)
            };

            // The slot goes back to the pool even when decoding failed
            self.free_inputs.push_back(input.index);
            self.spare_storage.push(input.data);
            decoded?;

            if input.end_of_stream && self.pending.is_empty() && !self.output_eos_sent {
                self.output_eos_sent = true;
                let info = BufferInfo {
                    size: 0,
                    presentation_time_us: input.presentation_time_us,
                    end_of_stream: true,
                };
                let index = self.next_index();
                self.status_queue
                    .push_back(OutputStatus::Buffer(OutputBuffer::new(index, info, Vec::new())));
            }
        }
        Ok(())
    }

    fn decode_input(&mut self, input: &PendingInput) -> Result<()> {
        let ts = self.to_timestamp(input.presentation_time_us);
        let Some(codec) = self.codec.as_mut() else {
            return Err(AudioError::InvalidState("Decoder not configured".to_string()));
        };

        let packet = Packet::new_from_slice(0, ts, 0, &input.data);
        let (spec, pcm) = match decode_packet(codec.as_mut(), &packet) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return Ok(()),
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet at {} us: {}", input.presentation_time_us, e);
                return Ok(());
            }
            Err(SymphoniaError::ResetRequired) => {
                log::warn!("Codec requested a reset, dropping packet");
                codec.reset();
                return Ok(());
            }
            Err(e) => return Err(AudioError::DecodingError(format!("Decoding failed: {}", e))),
        };

        let decoded_format = PcmFormat {
            sample_rate: spec.rate,
            channels: spec.channels.count().min(MAX_OUTPUT_CHANNELS) as u16,
        };
        if self.format != Some(decoded_format) {
            log::debug!("Output format is now {:?}", decoded_format);
            self.format = Some(decoded_format);
            self.status_queue.push_back(OutputStatus::FormatChanged(decoded_format));
        }

        if pcm.len() > self.slot_capacity {
            self.slot_capacity = pcm.len().next_power_of_two();
            self.generation += 1;
            log::debug!(
                "Output pool grown to {} bytes per slot (generation {})",
                self.slot_capacity,
                self.generation
            );
            self.status_queue.push_back(OutputStatus::BuffersChanged);
        }

        let info = BufferInfo {
            size: pcm.len(),
            presentation_time_us: input.presentation_time_us,
            end_of_stream: false,
        };
        let index = self.next_index();
        self.status_queue
            .push_back(OutputStatus::Buffer(OutputBuffer::new(index, info, pcm)));
        Ok(())
    }
}

/// Decode one packet into interleaved little-endian i16 bytes, at most stereo
fn decode_packet(
    codec: &mut dyn codecs::Decoder,
    packet: &Packet,
) -> std::result::Result<Option<(SignalSpec, Vec<u8>)>, SymphoniaError> {
    let decoded = codec.decode(packet)?;
    let spec = *decoded.spec();
    let frames = decoded.frames();
    if frames == 0 {
        return Ok(None);
    }

    let mut samples = SampleBuffer::<i16>::new(frames as u64, spec);
    samples.copy_interleaved_ref(decoded);

    let channels = spec.channels.count().max(1);
    let kept = channels.min(MAX_OUTPUT_CHANNELS);
    let mut pcm = Vec::with_capacity(frames * kept * 2);
    for frame in samples.samples().chunks_exact(channels) {
        for sample in &frame[..kept] {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
    }
    Ok(Some((spec, pcm)))
}

impl Decoder for SymphoniaDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, format: &TrackFormat) -> Result<()> {
        let params = format.codec_params.as_ref().ok_or_else(|| {
            AudioError::DecoderInitError("Track has no codec parameters".to_string())
        })?;

        let codec = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| AudioError::DecoderInitError(format!("Failed to create decoder: {}", e)))?;

        self.time_base = params
            .time_base
            .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)));
        self.format = match (format.sample_rate, format.channels) {
            (Some(sample_rate), Some(channels)) => Some(PcmFormat {
                sample_rate,
                channels: channels.min(MAX_OUTPUT_CHANNELS as u16),
            }),
            _ => None,
        };
        self.codec = Some(codec);
        self.reset_queues();

        log::debug!("Configured {} with {:?}", self.name, self.format);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.codec.is_none() {
            return Err(AudioError::DecoderInitError(
                "Decoder started before configure".to_string(),
            ));
        }
        self.started = true;
        Ok(())
    }

    fn dequeue_input_buffer(&mut self, _timeout: Duration) -> Option<InputBuffer> {
        if !self.started || self.input_eos_queued {
            return None;
        }
        let index = self.free_inputs.pop_front()?;
        let data = self.spare_storage.pop().unwrap_or_default();
        Some(InputBuffer::new(index, data))
    }

    fn queue_input_buffer(
        &mut self,
        buffer: InputBuffer,
        size: usize,
        presentation_time_us: u64,
        end_of_stream: bool,
    ) -> Result<()> {
        if !self.started {
            return Err(AudioError::InvalidState("Decoder not started".to_string()));
        }
        if self.input_eos_queued {
            return Err(AudioError::InvalidState(
                "Input queued after end of stream".to_string(),
            ));
        }

        let index = buffer.index();
        let mut data = buffer.into_data();
        data.truncate(size);
        self.input_eos_queued = end_of_stream;
        self.pending.push_back(PendingInput {
            index,
            data,
            presentation_time_us,
            end_of_stream,
        });
        Ok(())
    }

    fn dequeue_output_buffer(&mut self, timeout: Duration) -> Result<OutputStatus> {
        if !self.started {
            return Err(AudioError::InvalidState("Decoder not started".to_string()));
        }

        self.pump_pending()?;
        match self.status_queue.pop_front() {
            Some(status) => Ok(status),
            None => {
                std::thread::sleep(timeout);
                Ok(OutputStatus::TryAgainLater)
            }
        }
    }

    fn release_output_buffer(&mut self, buffer: OutputBuffer) {
        let mut data = buffer.into_data();
        if data.capacity() > 0 {
            data.clear();
            self.spare_storage.push(data);
        }
    }

    fn output_buffers(&self) -> OutputBufferView {
        OutputBufferView {
            count: OUTPUT_SLOTS,
            slot_capacity: self.slot_capacity,
            generation: self.generation,
        }
    }

    fn output_format(&self) -> Option<PcmFormat> {
        self.format
    }

    fn flush(&mut self) -> Result<()> {
        self.reset_queues();
        if let Some(codec) = self.codec.as_mut() {
            codec.reset();
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        self.reset_queues();
        Ok(())
    }

    fn release(&mut self) {
        self.started = false;
        self.reset_queues();
        self.spare_storage.clear();
        self.codec = None;
    }
}

/// A decoder available in this build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub mime: &'static str,
}

/// Decoders registered with Symphonia, grouped by the mime type they play
pub fn list_codecs() -> Vec<CodecInfo> {
    let registry = symphonia::default::get_codecs();
    mime::AUDIO_MIMES
        .iter()
        .flat_map(|&mime| {
            mime::codecs_for_mime(mime)
                .into_iter()
                .filter_map(|codec| registry.get_codec(codec))
                .map(move |descriptor| CodecInfo {
                    name: descriptor.short_name,
                    description: descriptor.long_name,
                    mime,
                })
        })
        .collect()
}

/// Factory that checks Symphonia's codec registry before creating a decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoderFactory;

impl DecoderFactory for SymphoniaDecoderFactory {
    fn create_decoder_by_type(&self, mime: &str) -> Result<Box<dyn Decoder>> {
        let registry = symphonia::default::get_codecs();
        let supported = mime::codecs_for_mime(mime)
            .into_iter()
            .any(|codec| registry.get_codec(codec).is_some());

        if !supported {
            return Err(AudioError::DecoderInitError(format!(
                "No decoder available for {}",
                mime
            )));
        }
        Ok(Box::new(SymphoniaDecoder::new(mime)))
    }
}
