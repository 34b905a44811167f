// Player event delivery
// Events are posted to the host's execution context and never run on the engine thread

use crate::error::AudioError;
use parking_lot::{Mutex, RwLock};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Listener implemented by the host application
///
/// Per session: at most one `on_start`, then any number of `on_play_update`,
/// then exactly one of `on_stop` or `on_error`.
pub trait PlayerEvents: Send + Sync {
    /// Track opened; `duration_ms` is 0 for live streams
    fn on_start(&self, mime: &str, sample_rate: u32, channels: u16, duration_ms: u64);

    /// Pump started or resumed from pause
    fn on_play(&self);

    /// Playback position advanced
    fn on_play_update(&self, percent: u32, current_ms: u64, total_ms: u64);

    /// Session finished and released its resources
    fn on_stop(&self);

    /// Session aborted
    fn on_error(&self, error: &AudioError);
}

/// Player event types
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Start {
        mime: String,
        sample_rate: u32,
        channels: u16,
        duration_ms: u64,
    },

    Play,

    PlayUpdate {
        percent: u32,
        current_ms: u64,
        total_ms: u64,
    },

    Stop,

    Error(AudioError),
}

impl PlayerEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlayerEvent::Stop | PlayerEvent::Error(_))
    }

    /// Invoke the matching listener method
    pub fn deliver(&self, listener: &dyn PlayerEvents) {
        match self {
            PlayerEvent::Start {
                mime,
                sample_rate,
                channels,
                duration_ms,
            } => listener.on_start(mime, *sample_rate, *channels, *duration_ms),
            PlayerEvent::Play => listener.on_play(),
            PlayerEvent::PlayUpdate {
                percent,
                current_ms,
                total_ms,
            } => listener.on_play_update(*percent, *current_ms, *total_ms),
            PlayerEvent::Stop => listener.on_stop(),
            PlayerEvent::Error(error) => listener.on_error(error),
        }
    }
}

/// Unit of work posted to the host's execution context
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The host's execution context, e.g. a UI loop
///
/// `post` must not run the task synchronously on the calling thread.
pub trait EventHandler: Send + Sync {
    /// Queue a task. Returns false if the context has shut down.
    fn post(&self, task: Task) -> bool;
}

/// Default handler: a dedicated thread draining a FIFO task queue
pub struct ThreadHandler {
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ThreadHandler {
    pub fn new(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    task();
                }
                log::debug!("Event handler thread exited");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stop accepting tasks and wait for queued ones to run.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            // Dropping the last handle from inside a task must not self-join
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

impl EventHandler for ThreadHandler {
    fn post(&self, task: Task) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(task).is_ok(),
            None => false,
        }
    }
}

impl Drop for ThreadHandler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Rate limiter for progress events; other events pass through
pub struct ProgressThrottle {
    interval: Duration,
    last_update: Mutex<Option<Instant>>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_update: Mutex::new(None),
        }
    }

    /// Whether a progress event may be emitted now
    pub fn admit(&self) -> bool {
        if self.interval.is_zero() {
            return true;
        }
        let mut last_update = self.last_update.lock();
        match *last_update {
            Some(at) if at.elapsed() < self.interval => false,
            _ => {
                *last_update = Some(Instant::now());
                true
            }
        }
    }

    pub fn reset(&self) {
        *self.last_update.lock() = None;
    }
}

/// Routes engine events to the current listener through the host's handler
#[derive(Clone)]
pub struct EventDispatcher {
    listener: Arc<RwLock<Option<Arc<dyn PlayerEvents>>>>,
    handler: Arc<dyn EventHandler>,
    throttle: Arc<ProgressThrottle>,
}

impl EventDispatcher {
    pub fn new(handler: Arc<dyn EventHandler>, progress_interval: Duration) -> Self {
        Self {
            listener: Arc::new(RwLock::new(None)),
            handler,
            throttle: Arc::new(ProgressThrottle::new(progress_interval)),
        }
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn PlayerEvents>>) {
        *self.listener.write() = listener;
    }

    /// Called when a session starts so its first update is never throttled.
    pub fn reset_throttle(&self) {
        self.throttle.reset();
    }

    pub fn dispatch(&self, event: PlayerEvent) {
        if matches!(event, PlayerEvent::PlayUpdate { .. }) && !self.throttle.admit() {
            return;
        }

        let Some(listener) = self.listener.read().clone() else {
            return;
        };
        if !self.handler.post(Box::new(move || event.deliver(&*listener))) {
            log::warn!("Event handler rejected event, host context is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Condvar;

    /// Records events in arrival order together with the delivering thread
    struct TestListener {
        events: Mutex<Vec<(PlayerEvent, thread::ThreadId)>>,
        arrived: Condvar,
    }

    impl TestListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                arrived: Condvar::new(),
            })
        }

        fn record(&self, event: PlayerEvent) {
            self.events.lock().push((event, thread::current().id()));
            self.arrived.notify_all();
        }

        fn wait_for(&self, count: usize) -> Vec<(PlayerEvent, thread::ThreadId)> {
            let mut events = self.events.lock();
            let deadline = Instant::now() + Duration::from_secs(5);
            while events.len() < count {
                if self.arrived.wait_until(&mut events, deadline).timed_out() {
                    break;
                }
            }
            events.clone()
        }
    }

    impl PlayerEvents for TestListener {
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

    fn init_test_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn dispatcher(interval_ms: u64) -> EventDispatcher {
        init_test_logging();
        let handler = Arc::new(ThreadHandler::new("test-events").unwrap());
        EventDispatcher::new(handler, Duration::from_millis(interval_ms))
    }

    #[test]
    fn test_events_delivered_in_order_off_caller_thread() {
        let listener = TestListener::new();
        let events = dispatcher(0);
        events.set_listener(Some(listener.clone()));

        events.dispatch(PlayerEvent::Start {
            mime: "audio/mpeg".to_string(),
            sample_rate: 44100,
            channels: 2,
            duration_ms: 1000,
        });
        for i in 0..5 {
            events.dispatch(PlayerEvent::PlayUpdate {
                percent: i * 20,
                current_ms: i as u64 * 200,
                total_ms: 1000,
            });
        }
        events.dispatch(PlayerEvent::Stop);

        let received = listener.wait_for(7);
        assert_eq!(received.len(), 7);
        assert!(matches!(received[0].0, PlayerEvent::Start { .. }));
        assert_eq!(received[6].0, PlayerEvent::Stop);
        let percents: Vec<u32> = received
            .iter()
            .filter_map(|(e, _)| match e {
                PlayerEvent::PlayUpdate { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![0, 20, 40, 60, 80]);
        assert!(received.iter().all(|(_, id)| *id != thread::current().id()));
    }

    #[test]
    fn test_throttled_progress_keeps_terminal_events() {
        let listener = TestListener::new();
        let events = dispatcher(100);
        events.set_listener(Some(listener.clone()));

        // Send multiple position updates rapidly
        for i in 0..10 {
            events.dispatch(PlayerEvent::PlayUpdate {
                percent: i,
                current_ms: i as u64,
                total_ms: 100,
            });
            thread::sleep(Duration::from_millis(5));
        }
        events.dispatch(PlayerEvent::Stop);

        let received = listener.wait_for(2);
        thread::sleep(Duration::from_millis(50));
        let received_len = listener.events.lock().len();
        assert!(received_len < 11);
        assert_eq!(received.last().map(|(e, _)| e.clone()), Some(PlayerEvent::Stop));
    }

    #[test]
    fn test_throttle_reset_admits_immediately() {
        let throttle = ProgressThrottle::new(Duration::from_secs(60));
        assert!(throttle.admit());
        assert!(!throttle.admit());
        throttle.reset();
        assert!(throttle.admit());
    }

    #[test]
    fn test_dispatch_without_listener_is_noop() {
        let events = dispatcher(0);
        events.dispatch(PlayerEvent::Stop);
        events.set_listener(None);
        events.dispatch(PlayerEvent::Play);
    }

    #[test]
    fn test_shutdown_handler_rejects_tasks() {
        let handler = ThreadHandler::new("test-shutdown").unwrap();
        assert!(handler.post(Box::new(|| {})));
        handler.shutdown();
        assert!(!handler.post(Box::new(|| {})));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(PlayerEvent::Stop.is_terminal());
        assert!(PlayerEvent::Error(AudioError::Other("x".into())).is_terminal());
        assert!(!PlayerEvent::Play.is_terminal());
    }
}
