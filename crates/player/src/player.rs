// Host-facing player

use crate::backend::PlayerBackend;
use crate::engine::PlaybackEngine;
use crate::signals::SessionSignals;
use std::sync::Arc;
use std::thread;
use tonearm_core::{
    AudioError, AudioPlayer, DataSource, EngineConfig, EventDispatcher, EventHandler,
    MediaDescriptor, PlayerEvent, PlayerEvents, PlayerState, Result, ThreadHandler,
};

/// Single-track player driving one engine thread per session
///
/// Commands never block on the engine. Events reach the listener through the
/// configured [`EventHandler`], never on the engine thread itself.
pub struct Player {
    source: Option<DataSource>,
    backend: PlayerBackend,
    config: EngineConfig,
    signals: Arc<SessionSignals>,
    events: EventDispatcher,
    engine_thread: Option<thread::JoinHandle<()>>,
}

impl Player {
    /// Player with the default backend and its own event thread
    pub fn new() -> Result<Self> {
        Self::with_backend(PlayerBackend::default(), EngineConfig::default())
    }

    pub fn with_backend(backend: PlayerBackend, config: EngineConfig) -> Result<Self> {
        let handler = ThreadHandler::new("tonearm-events")
            .map_err(|e| AudioError::ThreadError(format!("Failed to spawn event thread: {}", e)))?;
        Ok(Self::with_handler(backend, config, Arc::new(handler)))
    }

    /// Player delivering events through `handler`
    pub fn with_handler(
        backend: PlayerBackend,
        config: EngineConfig,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        let target_duration_us = config.target_duration.as_micros() as u64;
        let events = EventDispatcher::new(handler, config.progress_interval);
        Self {
            source: None,
            backend,
            config,
            signals: Arc::new(SessionSignals::new(target_duration_us)),
            events,
            engine_thread: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fallback duration reported instead of the source's, zero to disable (µs)
    pub fn set_target_duration_us(&mut self, duration_us: u64) {
        self.config.target_duration = std::time::Duration::from_micros(duration_us);
        self.signals.set_target_duration_us(duration_us);
    }

    /// Format of the open session, if any
    pub fn media(&self) -> Option<MediaDescriptor> {
        self.signals.media()
    }

    /// Last reported playback position (µs)
    pub fn position_us(&self) -> u64 {
        self.signals.position_us()
    }

    /// Whether an engine thread currently owns a session
    pub fn is_session_active(&self) -> bool {
        self.signals.is_session_active()
    }

    fn start_session(&mut self) -> Result<()> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| AudioError::InvalidState("No data source set".to_string()))?;

        if !self.signals.begin_session() {
            log::warn!("play() ignored, previous session is still running");
            return Ok(());
        }

        // The previous engine thread has finished its teardown by now
        if let Some(handle) = self.engine_thread.take() {
            if handle.join().is_err() {
                log::warn!("Previous engine thread panicked");
            }
        }

        self.events.reset_throttle();
        let engine = PlaybackEngine::new(
            source,
            self.backend.clone(),
            self.config.clone(),
            self.signals.clone(),
            self.events.clone(),
        );

        let spawned = thread::Builder::new()
            .name("tonearm-engine".to_string())
            .spawn(move || engine.run());
        match spawned {
            Ok(handle) => {
                self.engine_thread = Some(handle);
                log::info!("Engine thread started");
                Ok(())
            }
            Err(e) => {
                self.signals.abandon_session();
                Err(AudioError::ThreadError(format!(
                    "Failed to spawn engine thread: {}",
                    e
                )))
            }
        }
    }
}

impl AudioPlayer for Player {
    fn set_data_source(&mut self, source: DataSource) {
        log::info!("set_data_source: {}", source);
        self.source = Some(source);
    }

    fn set_events_listener(&mut self, listener: Option<Arc<dyn PlayerEvents>>) {
        self.events.set_listener(listener);
    }

    fn set_loop(&mut self, looping: bool) {
        log::info!("set_loop: {}", looping);
        self.signals.set_looping(looping);
    }

    fn play(&mut self) -> Result<()> {
        let state = self.signals.state().clone();
        match state.get() {
            PlayerState::Stopped => self.start_session(),
            PlayerState::ReadyToPlay => {
                if state.transition(PlayerState::ReadyToPlay, PlayerState::Playing) {
                    log::info!("play: resuming");
                    self.events.dispatch(PlayerEvent::Play);
                }
                Ok(())
            }
            PlayerState::Playing => Ok(()),
        }
    }

    fn pause(&mut self) {
        if self
            .signals
            .state()
            .transition(PlayerState::Playing, PlayerState::ReadyToPlay)
        {
            log::info!("pause: pausing");
        }
    }

    fn stop(&mut self) {
        if self.signals.is_session_active() {
            log::info!("stop: requesting engine stop");
        }
        self.signals.request_stop();
    }

    fn seek(&mut self, position_us: u64) {
        if !self.signals.is_session_active() {
            log::warn!("seek ignored, no session is running");
            return;
        }
        log::info!("seek: {} us", position_us);
        self.signals.post_seek(position_us);
    }

    /// Percent of the source's own duration; the fallback target is not used here
    fn seek_percent(&mut self, percent: u32) {
        let duration_us = self.signals.reported_duration_us();
        let position_us = percent.min(100) as u64 * duration_us / 100;
        self.seek(position_us);
    }

    fn duration(&self) -> u64 {
        self.signals.effective_duration_us()
    }

    fn is_live(&self) -> bool {
        self.signals.reported_duration_us() == 0
    }

    fn state(&self) -> PlayerState {
        self.signals.state().get()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.signals.request_stop();
        if let Some(handle) = self.engine_thread.take() {
            if handle.join().is_err() {
                log::warn!("Engine thread panicked");
            }
        }
    }
}
