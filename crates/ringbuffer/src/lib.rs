// Interleaved i16 PCM ring buffer with blocking writers

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed-capacity ring of interleaved 16-bit samples
pub struct PcmRingBuffer {
    buffer: Vec<i16>,
    write_pos: usize,
    read_pos: usize,
    size: usize,
}

impl PcmRingBuffer {
    /// One slot stays empty to tell full from empty, so `size` must be at least 2
    pub fn new(size: usize) -> Self {
        let size = size.max(2);
        Self {
            buffer: vec![0; size],
            write_pos: 0,
            read_pos: 0,
            size,
        }
    }

    pub fn write(&mut self, data: &[i16]) -> usize {
        let to_write = data.len().min(self.available_write());
        if to_write == 0 {
            return 0;
        }

        // Wrap-around takes two slice copies
        let write_end = self.write_pos + to_write;
        if write_end <= self.size {
            self.buffer[self.write_pos..write_end].copy_from_slice(&data[..to_write]);
            self.write_pos = write_end % self.size;
        } else {
            let first_chunk = self.size - self.write_pos;
            let second_chunk = to_write - first_chunk;

            self.buffer[self.write_pos..].copy_from_slice(&data[..first_chunk]);
            self.buffer[..second_chunk].copy_from_slice(&data[first_chunk..to_write]);
            self.write_pos = second_chunk;
        }

        to_write
    }

    pub fn read(&mut self, output: &mut [i16]) -> usize {
        let to_read = output.len().min(self.available_read());
        if to_read == 0 {
            return 0;
        }

        let read_end = self.read_pos + to_read;
        if read_end <= self.size {
            output[..to_read].copy_from_slice(&self.buffer[self.read_pos..read_end]);
            self.read_pos = read_end % self.size;
        } else {
            let first_chunk = self.size - self.read_pos;
            let second_chunk = to_read - first_chunk;

            output[..first_chunk].copy_from_slice(&self.buffer[self.read_pos..]);
            output[first_chunk..to_read].copy_from_slice(&self.buffer[..second_chunk]);
            self.read_pos = second_chunk;
        }

        to_read
    }

    pub fn available_write(&self) -> usize {
        self.size - self.available_read() - 1
    }

    pub fn available_read(&self) -> usize {
        if self.write_pos >= self.read_pos {
            self.write_pos - self.read_pos
        } else {
            self.size - (self.read_pos - self.write_pos)
        }
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.read_pos = 0;
    }
}

struct Shared {
    ring: PcmRingBuffer,
    closed: bool,
}

/// Ring shared between a blocking producer and a real-time consumer
///
/// The consumer never blocks; it takes what is there and wakes writers.
#[derive(Clone)]
pub struct SharedPcmRing {
    inner: Arc<(Mutex<Shared>, Condvar)>,
}

impl SharedPcmRing {
    pub fn new(size: usize) -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(Shared {
                    ring: PcmRingBuffer::new(size),
                    closed: false,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Write all of `data`, waiting for space as the consumer drains.
    ///
    /// Gives up early when the ring is closed or no space frees up within
    /// `stall_timeout`; returns the samples written.
    pub fn write_blocking(&self, data: &[i16], stall_timeout: Duration) -> usize {
        let (lock, cvar) = &*self.inner;
        let mut shared = lock.lock();
        let mut written = 0;
        let mut last_progress = Instant::now();

        while written < data.len() && !shared.closed {
            let n = shared.ring.write(&data[written..]);
            if n > 0 {
                written += n;
                last_progress = Instant::now();
                continue;
            }

            let deadline = last_progress + stall_timeout;
            if Instant::now() >= deadline {
                log::warn!(
                    "Ring write stalled, dropped {} samples",
                    data.len() - written
                );
                break;
            }
            cvar.wait_until(&mut shared, deadline);
        }

        written
    }

    /// Consumer read converted to f32 in [-1.0, 1.0); unfilled samples are zeroed
    pub fn read_f32(&self, output: &mut [f32]) -> usize {
        let (lock, cvar) = &*self.inner;
        let mut scratch = [0i16; 512];
        let mut filled = 0;
        {
            let mut shared = lock.lock();
            while filled < output.len() {
                let want = (output.len() - filled).min(scratch.len());
                let n = shared.ring.read(&mut scratch[..want]);
                if n == 0 {
                    break;
                }
                for (dst, src) in output[filled..filled + n].iter_mut().zip(&scratch[..n]) {
                    *dst = *src as f32 / 32768.0;
                }
                filled += n;
            }
        }

        output[filled..].fill(0.0);
        if filled > 0 {
            cvar.notify_all();
        }
        filled
    }

    pub fn clear(&self) {
        let (lock, cvar) = &*self.inner;
        lock.lock().ring.clear();
        cvar.notify_all();
    }

    /// Reject further writes and wake any blocked writer
    pub fn close(&self) {
        let (lock, cvar) = &*self.inner;
        lock.lock().closed = true;
        cvar.notify_all();
    }
}
