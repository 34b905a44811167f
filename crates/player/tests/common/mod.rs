// Scripted collaborators and a recording listener for engine tests
#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tonearm_decode::{
    BufferInfo, Decoder, DecoderFactory, InputBuffer, OutputBuffer, OutputBufferView,
    OutputStatus, PcmFormat,
};
use tonearm_demux::{DemuxerFactory, SeekMode, SourceDemuxer, TrackFormat};
use tonearm_player::{
    AudioError, AudioPlayer, DataSource, EngineConfig, Player, PlayerBackend, PlayerEvent,
    PlayerEvents, Result,
};
use tonearm_sink::{AudioSink, AudioSinkFactory, SinkSpec};

pub const UNIT_INTERVAL_US: u64 = 100_000;

pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// -----------------------------------------------------------------------------
// Demuxer
// -----------------------------------------------------------------------------

/// What a scripted source declares and contains
#[derive(Debug, Clone)]
pub struct Script {
    pub mime: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_us: Option<u64>,
    pub units: usize,
    pub fail_open: bool,
}

impl Script {
    /// 10 s of AAC at 44.1 kHz stereo, one unit per 100 ms
    pub fn aac_10s() -> Self {
        Self {
            mime: Some("audio/mp4a-latm".to_string()),
            sample_rate: 44100,
            channels: 2,
            duration_us: Some(10_000_000),
            units: 100,
            fail_open: false,
        }
    }

    pub fn with_units(mut self, units: usize) -> Self {
        self.units = units;
        self.duration_us = self.duration_us.map(|_| units as u64 * UNIT_INTERVAL_US);
        self
    }

    pub fn live(mut self) -> Self {
        self.duration_us = None;
        self
    }

    pub fn with_mime(mut self, mime: Option<&str>) -> Self {
        self.mime = mime.map(str::to_string);
        self
    }
}

#[derive(Default)]
pub struct DemuxProbe {
    pub opened: AtomicUsize,
    pub seeks: Mutex<Vec<u64>>,
}

pub struct ScriptedDemuxerFactory {
    pub script: Script,
    pub probe: Arc<DemuxProbe>,
}

impl ScriptedDemuxerFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            probe: Arc::new(DemuxProbe::default()),
        }
    }
}

impl DemuxerFactory for ScriptedDemuxerFactory {
    fn open(&self, source: &DataSource) -> Result<Box<dyn SourceDemuxer>> {
        if self.script.fail_open {
            return Err(AudioError::OpenError(format!("cannot open {}", source)));
        }
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedDemuxer {
            script: self.script.clone(),
            index: 0,
            probe: self.probe.clone(),
        }))
    }
}

/// Units of 64 bytes at a fixed 100 ms spacing
pub struct ScriptedDemuxer {
    script: Script,
    index: usize,
    probe: Arc<DemuxProbe>,
}

impl SourceDemuxer for ScriptedDemuxer {
    fn track_format(&self) -> Result<TrackFormat> {
        Ok(TrackFormat {
            mime: self.script.mime.clone(),
            sample_rate: Some(self.script.sample_rate),
            channels: Some(self.script.channels),
            bit_rate: Some(128_000),
            duration_us: self.script.duration_us,
            codec_params: None,
        })
    }

    fn read_sample_data(&mut self, buf: &mut Vec<u8>) -> Option<usize> {
        if self.index >= self.script.units {
            return None;
        }
        buf.clear();
        buf.resize(64, self.index as u8);
        Some(buf.len())
    }

    fn sample_time(&self) -> Option<u64> {
        (self.index < self.script.units).then(|| self.index as u64 * UNIT_INTERVAL_US)
    }

    fn advance(&mut self) -> bool {
        self.index += 1;
        self.index < self.script.units
    }

    fn seek_to(&mut self, position_us: u64, _mode: SeekMode) -> Result<u64> {
        self.probe.seeks.lock().push(position_us);
        self.index = ((position_us / UNIT_INTERVAL_US) as usize).min(self.script.units);
        Ok(self.index as u64 * UNIT_INTERVAL_US)
    }
}

// -----------------------------------------------------------------------------
// Decoder
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderBehavior {
    /// One output buffer per non-empty input
    Normal,
    /// Report BuffersChanged and FormatChanged before the first buffer
    AnnounceChanges,
    /// Accept input but never produce output
    NeverOutput,
    /// Panic on the given output poll
    PanicAfter(usize),
    FailConfigure,
}

#[derive(Default)]
pub struct DecoderProbe {
    pub created: AtomicUsize,
    pub flushes: AtomicUsize,
    pub stopped: AtomicBool,
    pub released: AtomicBool,
}

pub struct MockDecoderFactory {
    pub behavior: DecoderBehavior,
    pub fail_create: bool,
    pub probe: Arc<DecoderProbe>,
}

impl MockDecoderFactory {
    pub fn new(behavior: DecoderBehavior) -> Self {
        Self {
            behavior,
            fail_create: false,
            probe: Arc::new(DecoderProbe::default()),
        }
    }
}

impl DecoderFactory for MockDecoderFactory {
    fn create_decoder_by_type(&self, mime: &str) -> Result<Box<dyn Decoder>> {
        if self.fail_create {
            return Err(AudioError::DecoderInitError(format!("no decoder for {}", mime)));
        }
        self.probe.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDecoder {
            behavior: self.behavior,
            probe: self.probe.clone(),
            format: None,
            free_inputs: (0..4).collect(),
            pending: VecDeque::new(),
            announcements: VecDeque::new(),
            polls: 0,
            generation: 0,
        }))
    }
}

/// Bytes of PCM produced per access unit
pub const PCM_PER_UNIT: usize = 400;

pub struct MockDecoder {
    behavior: DecoderBehavior,
    probe: Arc<DecoderProbe>,
    format: Option<PcmFormat>,
    free_inputs: VecDeque<usize>,
    pending: VecDeque<(usize, usize, u64, bool)>,
    announcements: VecDeque<OutputStatus>,
    polls: usize,
    generation: u32,
}

impl Decoder for MockDecoder {
    fn name(&self) -> &str {
        "mock"
    }

    fn configure(&mut self, format: &TrackFormat) -> Result<()> {
        if self.behavior == DecoderBehavior::FailConfigure {
            return Err(AudioError::DecoderInitError("configure refused".into()));
        }
        let format = PcmFormat {
            sample_rate: format.sample_rate.unwrap_or(0),
            channels: format.channels.unwrap_or(0),
        };
        self.format = Some(format);
        if self.behavior == DecoderBehavior::AnnounceChanges {
            self.announcements.push_back(OutputStatus::BuffersChanged);
            self.announcements.push_back(OutputStatus::FormatChanged(PcmFormat {
                sample_rate: 48000,
                ..format
            }));
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn dequeue_input_buffer(&mut self, _timeout: Duration) -> Option<InputBuffer> {
        let index = self.free_inputs.pop_front()?;
        Some(InputBuffer::new(index, Vec::new()))
    }

    fn queue_input_buffer(
        &mut self,
        buffer: InputBuffer,
        size: usize,
        presentation_time_us: u64,
        end_of_stream: bool,
    ) -> Result<()> {
        self.pending
            .push_back((buffer.index(), size, presentation_time_us, end_of_stream));
        Ok(())
    }

    fn dequeue_output_buffer(&mut self, timeout: Duration) -> Result<OutputStatus> {
        self.polls += 1;
        if let DecoderBehavior::PanicAfter(limit) = self.behavior {
            if self.polls >= limit {
                panic!("mock decoder blew up");
            }
        }
        if let Some(status) = self.announcements.pop_front() {
            if matches!(status, OutputStatus::BuffersChanged) {
                self.generation += 1;
            }
            return Ok(status);
        }

        while let Some((index, size, pts, eos)) = self.pending.pop_front() {
            self.free_inputs.push_back(index);
            if self.behavior == DecoderBehavior::NeverOutput {
                continue;
            }
            if eos {
                let info = BufferInfo {
                    size: 0,
                    presentation_time_us: pts,
                    end_of_stream: true,
                };
                return Ok(OutputStatus::Buffer(OutputBuffer::new(index, info, Vec::new())));
            }
            if size > 0 {
                let info = BufferInfo {
                    size: PCM_PER_UNIT,
                    presentation_time_us: pts,
                    end_of_stream: false,
                };
                return Ok(OutputStatus::Buffer(OutputBuffer::new(
                    index,
                    info,
                    vec![0u8; PCM_PER_UNIT],
                )));
            }
        }

        thread::sleep(timeout);
        Ok(OutputStatus::TryAgainLater)
    }

    fn release_output_buffer(&mut self, _buffer: OutputBuffer) {}

    fn output_buffers(&self) -> OutputBufferView {
        OutputBufferView {
            count: 4,
            slot_capacity: PCM_PER_UNIT,
            generation: self.generation,
        }
    }

    fn output_format(&self) -> Option<PcmFormat> {
        self.format
    }

    fn flush(&mut self) -> Result<()> {
        self.probe.flushes.fetch_add(1, Ordering::SeqCst);
        self.pending.clear();
        self.free_inputs = (0..4).collect();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.probe.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        self.probe.released.store(true, Ordering::SeqCst);
    }
}

// -----------------------------------------------------------------------------
// Sink
// -----------------------------------------------------------------------------

#[derive(Default)]
pub struct SinkProbe {
    pub created: AtomicUsize,
    pub bytes_written: AtomicU64,
    pub flushed: AtomicBool,
    pub released: AtomicBool,
    pub spec: Mutex<Option<SinkSpec>>,
}

pub struct RecordingSinkFactory {
    /// Sleep per write, to make sessions last
    pub write_delay: Duration,
    pub fail_create: bool,
    pub probe: Arc<SinkProbe>,
}

impl RecordingSinkFactory {
    pub fn new(write_delay: Duration) -> Self {
        Self {
            write_delay,
            fail_create: false,
            probe: Arc::new(SinkProbe::default()),
        }
    }
}

impl AudioSinkFactory for RecordingSinkFactory {
    fn create_sink(&self, spec: SinkSpec) -> Result<Box<dyn AudioSink>> {
        if self.fail_create {
            return Err(AudioError::DeviceError("no device".into()));
        }
        self.probe.created.fetch_add(1, Ordering::SeqCst);
        *self.probe.spec.lock() = Some(spec);
        Ok(Box::new(RecordingSink {
            write_delay: self.write_delay,
            probe: self.probe.clone(),
        }))
    }
}

pub struct RecordingSink {
    write_delay: Duration,
    probe: Arc<SinkProbe>,
}

impl AudioSink for RecordingSink {
    fn play(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if !self.write_delay.is_zero() {
            thread::sleep(self.write_delay);
        }
        self.probe
            .bytes_written
            .fetch_add(data.len() as u64, Ordering::SeqCst);
        Ok(data.len())
    }

    fn flush(&mut self) {
        self.probe.flushed.store(true, Ordering::SeqCst);
    }

    fn release(&mut self) {
        self.probe.released.store(true, Ordering::SeqCst);
    }
}

// -----------------------------------------------------------------------------
// Listener
// -----------------------------------------------------------------------------

/// Records events with the name of the delivering thread
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(PlayerEvent, Option<String>)>>,
    changed: Condvar,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, event: PlayerEvent) {
        let thread_name = thread::current().name().map(str::to_string);
        self.events.lock().push((event, thread_name));
        self.changed.notify_all();
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn delivery_threads(&self) -> Vec<Option<String>> {
        self.events.lock().iter().map(|(_, t)| t.clone()).collect()
    }

    /// (percent, current_ms, total_ms) of every update so far
    pub fn updates(&self) -> Vec<(u32, u64, u64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PlayerEvent::PlayUpdate {
                    percent,
                    current_ms,
                    total_ms,
                } => Some((percent, current_ms, total_ms)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&PlayerEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|(e, _)| pred(e)).count()
    }

    pub fn terminal_count(&self) -> usize {
        self.count(PlayerEvent::is_terminal)
    }

    /// Wait until `pred` holds for the recorded events
    pub fn wait_until(&self, timeout: Duration, pred: impl Fn(&[PlayerEvent]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock();
        loop {
            let snapshot: Vec<PlayerEvent> = events.iter().map(|(e, _)| e.clone()).collect();
            if pred(&snapshot) {
                return true;
            }
            if self.changed.wait_until(&mut events, deadline).timed_out() {
                let snapshot: Vec<PlayerEvent> = events.iter().map(|(e, _)| e.clone()).collect();
                return pred(&snapshot);
            }
        }
    }

    pub fn wait_terminal(&self, timeout: Duration) -> bool {
        self.wait_until(timeout, |events| events.iter().any(PlayerEvent::is_terminal))
    }

    pub fn wait_update(&self, timeout: Duration, pred: impl Fn(u32, u64, u64) -> bool) -> bool {
        self.wait_until(timeout, |events| {
            events.iter().any(|e| match e {
                PlayerEvent::PlayUpdate {
                    percent,
                    current_ms,
                    total_ms,
                } => pred(*percent, *current_ms, *total_ms),
                _ => false,
            })
        })
    }
}

impl PlayerEvents for RecordingListener {
    fn on_start(&self, mime: &str, sample_rate: u32, channels: u16, duration_ms: u64) {
        self.record(PlayerEvent::Start {
            mime: mime.to_string(),
            sample_rate,
            channels,
            duration_ms,
        });
    }

    fn on_play(&self) {
        self.record(PlayerEvent::Play);
    }

    fn on_play_update(&self, percent: u32, current_ms: u64, total_ms: u64) {
        self.record(PlayerEvent::PlayUpdate {
            percent,
            current_ms,
            total_ms,
        });
    }

    fn on_stop(&self) {
        self.record(PlayerEvent::Stop);
    }

    fn on_error(&self, error: &AudioError) {
        self.record(PlayerEvent::Error(error.clone()));
    }
}

// -----------------------------------------------------------------------------
// Harness
// -----------------------------------------------------------------------------

/// A player wired to scripted collaborators, with handles on all of them
pub struct Harness {
    pub player: Player,
    pub listener: Arc<RecordingListener>,
    pub demux: Arc<DemuxProbe>,
    pub decoder: Arc<DecoderProbe>,
    pub sink: Arc<SinkProbe>,
}

pub struct HarnessBuilder {
    pub script: Script,
    pub behavior: DecoderBehavior,
    pub fail_decoder_create: bool,
    pub fail_sink_create: bool,
    pub write_delay: Duration,
    pub config: EngineConfig,
}

impl HarnessBuilder {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            behavior: DecoderBehavior::Normal,
            fail_decoder_create: false,
            fail_sink_create: false,
            write_delay: Duration::ZERO,
            config: EngineConfig::default(),
        }
    }

    pub fn behavior(mut self, behavior: DecoderBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn fail_decoder_create(mut self) -> Self {
        self.fail_decoder_create = true;
        self
    }

    pub fn fail_sink_create(mut self) -> Self {
        self.fail_sink_create = true;
        self
    }

    pub fn build(self) -> Harness {
        init_test_logging();

        let demuxers = ScriptedDemuxerFactory::new(self.script);
        let mut decoders = MockDecoderFactory::new(self.behavior);
        decoders.fail_create = self.fail_decoder_create;
        let mut sinks = RecordingSinkFactory::new(self.write_delay);
        sinks.fail_create = self.fail_sink_create;

        let demux = demuxers.probe.clone();
        let decoder = decoders.probe.clone();
        let sink = sinks.probe.clone();

        let backend = PlayerBackend::new(Arc::new(demuxers), Arc::new(decoders), Arc::new(sinks));
        let mut player = Player::with_backend(backend, self.config).unwrap();
        let listener = RecordingListener::new();
        player.set_events_listener(Some(listener.clone()));
        player.set_data_source(DataSource::path("/scripted/source.m4a"));

        Harness {
            player,
            listener,
            demux,
            decoder,
            sink,
        }
    }
}
