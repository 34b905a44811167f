// Headless sink that consumes PCM on a wall clock

use crate::{AudioSink, AudioSinkFactory, SinkSpec};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tonearm_core::{AudioError, Result};

/// Sink with no device behind it
///
/// When paced, writes block the way a device ring would: the backlog of
/// unplayed audio never exceeds the configured buffer size.
pub struct ClockedSink {
    spec: SinkSpec,
    paced: bool,
    played_until: Option<Instant>,
    bytes_written: Arc<AtomicU64>,
    released: bool,
}

impl ClockedSink {
    pub fn new(spec: SinkSpec, paced: bool) -> Self {
        Self::with_counter(spec, paced, Arc::new(AtomicU64::new(0)))
    }

    fn with_counter(spec: SinkSpec, paced: bool, bytes_written: Arc<AtomicU64>) -> Self {
        Self {
            spec,
            paced,
            played_until: None,
            bytes_written,
            released: false,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    fn duration_of(&self, bytes: usize) -> Duration {
        let byte_rate = self.spec.byte_rate().max(1);
        Duration::from_micros(bytes as u64 * 1_000_000 / byte_rate)
    }
}

impl AudioSink for ClockedSink {
    fn play(&mut self) -> Result<()> {
        if self.released {
            return Err(AudioError::DeviceError("Sink already released".to_string()));
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.released {
            return Err(AudioError::DeviceError("Sink already released".to_string()));
        }

        if self.paced {
            let now = Instant::now();
            let start = self.played_until.filter(|t| *t > now).unwrap_or(now);
            let until = start + self.duration_of(data.len());
            self.played_until = Some(until);

            // Block until the backlog fits in the buffer again
            let buffered = self.duration_of(self.spec.buffer_size_bytes);
            if let Some(wake) = until.checked_sub(buffered) {
                let now = Instant::now();
                if wake > now {
                    thread::sleep(wake - now);
                }
            }
        }

        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(data.len())
    }

    fn flush(&mut self) {
        self.played_until = None;
    }

    fn release(&mut self) {
        self.released = true;
        self.played_until = None;
    }
}

/// Factory for [`ClockedSink`]; totals are shared by every sink it creates
#[derive(Debug, Clone)]
pub struct ClockedSinkFactory {
    paced: bool,
    bytes_written: Arc<AtomicU64>,
    sinks_created: Arc<AtomicUsize>,
}

impl ClockedSinkFactory {
    /// Consume audio at its real-time rate
    pub fn paced() -> Self {
        Self::new(true)
    }

    /// Consume audio as fast as it is written
    pub fn unpaced() -> Self {
        Self::new(false)
    }

    pub fn new(paced: bool) -> Self {
        Self {
            paced,
            bytes_written: Arc::new(AtomicU64::new(0)),
            sinks_created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn sinks_created(&self) -> usize {
        self.sinks_created.load(Ordering::Relaxed)
    }
}

impl AudioSinkFactory for ClockedSinkFactory {
    fn create_sink(&self, spec: SinkSpec) -> Result<Box<dyn AudioSink>> {
        if spec.sample_rate == 0 {
            return Err(AudioError::DeviceError("Invalid sample rate 0".to_string()));
        }
        self.sinks_created.fetch_add(1, Ordering::Relaxed);
        log::debug!("Created {} clocked sink: {:?}", if self.paced { "paced" } else { "unpaced" }, spec);
        Ok(Box::new(ClockedSink::with_counter(
            spec,
            self.paced,
            self.bytes_written.clone(),
        )))
    }
}
