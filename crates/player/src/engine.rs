// Playback engine: open sequence, decode/output pump and teardown

use crate::backend::PlayerBackend;
use crate::signals::SessionSignals;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tonearm_core::{
    AudioError, DataSource, EngineConfig, EventDispatcher, PlayerEvent, PlayerState, Result,
};
use tonearm_decode::{Decoder, OutputBufferView, OutputStatus};
use tonearm_demux::{SeekMode, SourceDemuxer};
use tonearm_sink::{AudioSink, ChannelLayout, PcmEncoding, SinkSpec};

/// One playback session, run to completion on the engine thread
pub(crate) struct PlaybackEngine {
    source: DataSource,
    backend: PlayerBackend,
    config: EngineConfig,
    signals: Arc<SessionSignals>,
    events: EventDispatcher,
}

/// Session resources. Dropping it tears the session down.
struct Session {
    signals: Arc<SessionSignals>,
    decoder: Option<Box<dyn Decoder>>,
    sink: Option<Box<dyn AudioSink>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            if let Err(e) = decoder.stop() {
                log::warn!("[engine] decoder stop failed: {}", e);
            }
            decoder.release();
        }
        if let Some(mut sink) = self.sink.take() {
            sink.flush();
            sink.release();
        }
        self.signals.finish_session();
        log::info!("[engine] session torn down");
    }
}

/// Pump bookkeeping, owned by the engine thread
struct Pump {
    epoch: Instant,
    /// `now - pts` when the last access unit was read, µs since `epoch`
    tick_us: i64,
    pts_us: u64,
    duration_us: u64,
    input_eos: bool,
    output_eos: bool,
    no_output: u32,
    buffers: OutputBufferView,
}

impl Pump {
    fn new(duration_us: u64, buffers: OutputBufferView) -> Self {
        Self {
            epoch: Instant::now(),
            tick_us: 0,
            pts_us: 0,
            duration_us,
            input_eos: false,
            output_eos: false,
            no_output: 0,
            buffers,
        }
    }

    fn now_us(&self) -> i64 {
        self.epoch.elapsed().as_micros() as i64
    }

    /// Playback position derived from the clock rather than the demuxer
    fn estimate_us(&self) -> u64 {
        (self.now_us() - self.tick_us).max(0) as u64
    }

    fn restart_at(&mut self, pts_us: u64) {
        self.pts_us = pts_us;
        self.tick_us = self.now_us() - pts_us as i64;
        self.input_eos = false;
        self.output_eos = false;
        self.no_output = 0;
    }
}

impl PlaybackEngine {
    pub(crate) fn new(
        source: DataSource,
        backend: PlayerBackend,
        config: EngineConfig,
        signals: Arc<SessionSignals>,
        events: EventDispatcher,
    ) -> Self {
        Self {
            source,
            backend,
            config,
            signals,
            events,
        }
    }

    /// Run the session and emit its terminal event
    pub(crate) fn run(self) {
        let signals = self.signals.clone();
        let events = self.events.clone();

        match panic::catch_unwind(AssertUnwindSafe(|| self.run_session())) {
            Ok(Ok(())) => {
                log::info!("[engine] session ended");
                events.dispatch(PlayerEvent::Stop);
            }
            Ok(Err(e)) => {
                log::error!("[engine] session failed: {}", e);
                events.dispatch(PlayerEvent::Error(e));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("[engine] panicked: {}", message);
                signals.finish_session();
                events.dispatch(PlayerEvent::Error(AudioError::Other(format!(
                    "engine panicked: {}",
                    message
                ))));
            }
        }
    }

    fn run_session(&self) -> Result<()> {
        let mut session = Session {
            signals: self.signals.clone(),
            decoder: None,
            sink: None,
        };

        log::info!("[engine] opening {}", self.source);
        let mut demuxer = self
            .backend
            .demuxers
            .open(&self.source)
            .map_err(|e| reclassify(e, AudioError::OpenError))?;

        let format = demuxer
            .track_format()
            .map_err(|e| reclassify(e, AudioError::FormatError))?;
        let media = match format.descriptor() {
            Some(media) if format.is_audio() => media,
            Some(media) => {
                return Err(AudioError::FormatError(format!(
                    "Not an audio track: {}",
                    media.mime
                )))
            }
            None => {
                return Err(AudioError::FormatError(
                    "Track declares no mime type".to_string(),
                ))
            }
        };
        log::info!(
            "[engine] track mime={} sample_rate={} channels={} bit_rate={} duration_us={}",
            media.mime,
            media.sample_rate,
            media.channels,
            media.bit_rate,
            media.duration_us
        );
        self.signals.publish_media(media.clone());
        let duration_us = self.signals.effective_duration_us();

        let decoder = session.decoder.insert(
            self.backend
                .decoders
                .create_decoder_by_type(&media.mime)
                .map_err(|e| reclassify(e, AudioError::DecoderInitError))?,
        );

        self.events.dispatch(PlayerEvent::Start {
            mime: media.mime.clone(),
            sample_rate: media.sample_rate,
            channels: media.channels,
            duration_ms: duration_us / 1000,
        });

        decoder
            .configure(&format)
            .and_then(|_| decoder.start())
            .map_err(|e| reclassify(e, AudioError::DecoderInitError))?;
        log::info!("[engine] decoder {} started", decoder.name());

        let layout = ChannelLayout::from_channels(media.channels);
        let buffer_size_bytes = self
            .backend
            .sinks
            .min_buffer_size(media.sample_rate, layout, PcmEncoding::Pcm16Bit)
            .map_err(|e| reclassify(e, AudioError::DeviceError))?;
        let spec = SinkSpec {
            sample_rate: media.sample_rate,
            layout,
            encoding: PcmEncoding::Pcm16Bit,
            buffer_size_bytes,
        };
        let sink = session.sink.insert(
            self.backend
                .sinks
                .create_sink(spec)
                .map_err(|e| reclassify(e, AudioError::DeviceError))?,
        );
        sink.play()
            .map_err(|e| reclassify(e, AudioError::DeviceError))?;
        log::info!("[engine] sink started with {} byte buffer", buffer_size_bytes);

        let mut pump = Pump::new(duration_us, decoder.output_buffers());
        self.pump(demuxer.as_mut(), decoder.as_mut(), sink.as_mut(), &mut pump)
    }

    fn pump(
        &self,
        demuxer: &mut dyn SourceDemuxer,
        decoder: &mut dyn Decoder,
        sink: &mut dyn AudioSink,
        pump: &mut Pump,
    ) -> Result<()> {
        let state = self.signals.state();
        if self.signals.stop_requested() {
            return Ok(());
        }
        state.set(PlayerState::Playing);
        self.events.dispatch(PlayerEvent::Play);
        log::info!("[engine] playing");

        loop {
            if self.signals.stop_requested() || state.is_stopped() {
                break;
            }

            while !pump.output_eos && pump.no_output < self.config.stall_limit {
                self.wait_if_paused(pump);
                if self.signals.stop_requested() {
                    break;
                }
                if let Some(target_us) = self.signals.take_seek() {
                    self.apply_seek(demuxer, decoder, pump, target_us);
                }

                pump.no_output += 1;
                if !pump.input_eos {
                    if let Err(e) = self.feed_input(demuxer, decoder, pump) {
                        log::warn!("[engine] input rejected: {}", e);
                    }
                }
                self.drain_output(decoder, sink, pump)?;
            }

            if self.signals.stop_requested() {
                log::info!("[engine] stop requested");
                break;
            }

            if let Some(target_us) = self.signals.take_seek() {
                self.apply_seek(demuxer, decoder, pump, target_us);
                continue;
            }

            if pump.input_eos && pump.pts_us < pump.duration_us {
                // Decoded audio is still playing out of the sink
                pump.pts_us = pump.estimate_us().min(pump.duration_us);
                self.emit_progress(pump.pts_us, pump.duration_us);
                self.wait_if_paused(pump);
                thread::sleep(self.config.drain_sleep);
                continue;
            }

            let stalled = pump.no_output >= self.config.stall_limit;
            if self.signals.looping() && ((pump.input_eos && pump.output_eos) || stalled) {
                self.wait_if_paused(pump);
                if self.signals.stop_requested() {
                    break;
                }
                log::info!("[engine] looping back to start");
                if let Err(e) = demuxer.seek_to(0, SeekMode::ClosestSync) {
                    log::error!("[engine] cannot rewind for loop: {}", e);
                    break;
                }
                if let Err(e) = decoder.flush() {
                    log::warn!("[engine] decoder flush failed: {}", e);
                }
                pump.restart_at(0);
                self.events.reset_throttle();
                continue;
            }

            if stalled && !pump.input_eos {
                log::info!(
                    "[engine] no decoded output for {} polls, ending",
                    self.config.stall_limit
                );
            } else {
                log::info!("[engine] end of stream at {} us", pump.pts_us);
            }
            break;
        }

        Ok(())
    }

    fn wait_if_paused(&self, pump: &mut Pump) {
        let state = self.signals.state();
        if state.get() != PlayerState::ReadyToPlay {
            return;
        }

        log::info!("[engine] paused at {} us", pump.pts_us);
        let paused = state.wait_if_paused();
        pump.tick_us += paused.as_micros() as i64;
        log::info!("[engine] resumed after {} ms", paused.as_millis());
    }

    fn apply_seek(
        &self,
        demuxer: &mut dyn SourceDemuxer,
        decoder: &mut dyn Decoder,
        pump: &mut Pump,
        target_us: u64,
    ) {
        let target_us = match pump.duration_us {
            0 => target_us,
            duration_us => target_us.min(duration_us),
        };

        match demuxer.seek_to(target_us, SeekMode::ClosestSync) {
            Ok(reached_us) => {
                if let Err(e) = decoder.flush() {
                    log::warn!("[engine] decoder flush failed: {}", e);
                }
                pump.restart_at(reached_us);
                self.signals.set_position_us(reached_us);
                self.events.reset_throttle();
                log::info!("[engine] seek to {} us reached {} us", target_us, reached_us);
            }
            Err(e) => log::warn!("[engine] seek to {} us failed: {}", target_us, e),
        }
    }

    /// Move one access unit from the demuxer into a free decoder input slot
    fn feed_input(
        &self,
        demuxer: &mut dyn SourceDemuxer,
        decoder: &mut dyn Decoder,
        pump: &mut Pump,
    ) -> Result<()> {
        let Some(mut input) = decoder.dequeue_input_buffer(self.config.dequeue_timeout) else {
            return Ok(());
        };

        match demuxer.read_sample_data(input.data_mut()) {
            Some(size) => {
                let pts_us = demuxer.sample_time().unwrap_or(pump.pts_us);
                decoder.queue_input_buffer(input, size, pts_us, false)?;
                pump.pts_us = pts_us;
                pump.tick_us = pump.now_us() - pts_us as i64;
                self.emit_progress(pts_us, pump.duration_us);
                demuxer.advance();
            }
            None => {
                // Looping queues an empty boundary unit so output never signals EOS
                let looping = self.signals.looping();
                log::info!(
                    "[engine] input exhausted at {} us (looping: {})",
                    pump.pts_us,
                    looping
                );
                pump.input_eos = true;
                decoder.queue_input_buffer(input, 0, pump.pts_us, !looping)?;
            }
        }
        Ok(())
    }

    /// Poll one output buffer and write it to the sink. Only sink failures are fatal.
    fn drain_output(
        &self,
        decoder: &mut dyn Decoder,
        sink: &mut dyn AudioSink,
        pump: &mut Pump,
    ) -> Result<()> {
        let status = match decoder.dequeue_output_buffer(self.config.dequeue_timeout) {
            Ok(status) => status,
            Err(e) => {
                log::warn!("[engine] decode failed: {}", e);
                return Ok(());
            }
        };

        match status {
            OutputStatus::Buffer(buffer) => {
                let info = buffer.info();
                let written = if info.size > 0 {
                    write_all(sink, buffer.data())
                } else {
                    Ok(())
                };
                decoder.release_output_buffer(buffer);
                written?;

                if info.size > 0 {
                    pump.no_output = 0;
                }
                if info.end_of_stream {
                    log::info!("[engine] output end of stream");
                    pump.output_eos = true;
                }
            }
            OutputStatus::BuffersChanged => {
                pump.buffers = decoder.output_buffers();
                log::debug!(
                    "[engine] output buffers changed: {} x {} bytes",
                    pump.buffers.count,
                    pump.buffers.slot_capacity
                );
            }
            OutputStatus::FormatChanged(format) => {
                log::info!(
                    "[engine] output format changed to {} Hz, {} channels",
                    format.sample_rate,
                    format.channels
                );
            }
            OutputStatus::TryAgainLater => {}
        }
        Ok(())
    }

    fn emit_progress(&self, pts_us: u64, duration_us: u64) {
        let percent = match duration_us {
            0 => 0,
            _ => (pts_us.saturating_mul(100) / duration_us).min(100) as u32,
        };
        self.signals.set_position_us(pts_us);
        self.events.dispatch(PlayerEvent::PlayUpdate {
            percent,
            current_ms: pts_us / 1000,
            total_ms: duration_us / 1000,
        });
    }
}

fn write_all(sink: &mut dyn AudioSink, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        let written = sink
            .write(data)
            .map_err(|e| reclassify(e, AudioError::DeviceError))?;
        if written == 0 {
            return Err(AudioError::DeviceError(
                "Sink accepted no data".to_string(),
            ));
        }
        data = &data[written.min(data.len())..];
    }
    Ok(())
}

/// Keep `err` if it is already the kind `wrap` builds, otherwise rewrap its message
fn reclassify(err: AudioError, wrap: fn(String) -> AudioError) -> AudioError {
    if std::mem::discriminant(&err) == std::mem::discriminant(&wrap(String::new())) {
        err
    } else {
        wrap(err.to_string())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
