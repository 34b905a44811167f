// Cross-thread part of a playback session

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tonearm_core::{MediaDescriptor, PlayerState, PlayerStateContainer};

/// State shared between the host-facing [`Player`](crate::Player) and its engine thread
///
/// Everything else about a session is owned by the engine thread.
pub struct SessionSignals {
    state: PlayerStateContainer,
    stop: AtomicBool,
    looping: AtomicBool,
    seek: Mutex<Option<u64>>,
    target_duration_us: AtomicU64,
    reported_duration_us: AtomicU64,
    position_us: AtomicU64,
    media: RwLock<Option<MediaDescriptor>>,
    session_active: AtomicBool,
}

impl SessionSignals {
    pub fn new(target_duration_us: u64) -> Self {
        Self {
            state: PlayerStateContainer::new(),
            stop: AtomicBool::new(true),
            looping: AtomicBool::new(false),
            seek: Mutex::new(None),
            target_duration_us: AtomicU64::new(target_duration_us),
            reported_duration_us: AtomicU64::new(0),
            position_us: AtomicU64::new(0),
            media: RwLock::new(None),
            session_active: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &PlayerStateContainer {
        &self.state
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.state.interrupt();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::SeqCst);
    }

    pub fn looping(&self) -> bool {
        self.looping.load(Ordering::SeqCst)
    }

    /// Replace any pending seek with `position_us`
    pub fn post_seek(&self, position_us: u64) {
        *self.seek.lock() = Some(position_us);
    }

    pub fn take_seek(&self) -> Option<u64> {
        self.seek.lock().take()
    }

    pub fn has_pending_seek(&self) -> bool {
        self.seek.lock().is_some()
    }

    pub fn set_target_duration_us(&self, duration_us: u64) {
        self.target_duration_us.store(duration_us, Ordering::SeqCst);
    }

    pub fn reported_duration_us(&self) -> u64 {
        self.reported_duration_us.load(Ordering::SeqCst)
    }

    /// Fallback target duration when configured, the reported one otherwise
    pub fn effective_duration_us(&self) -> u64 {
        match self.target_duration_us.load(Ordering::SeqCst) {
            0 => self.reported_duration_us(),
            target => target,
        }
    }

    pub fn position_us(&self) -> u64 {
        self.position_us.load(Ordering::SeqCst)
    }

    pub fn set_position_us(&self, position_us: u64) {
        self.position_us.store(position_us, Ordering::SeqCst);
    }

    pub fn publish_media(&self, media: MediaDescriptor) {
        self.reported_duration_us
            .store(media.duration_us, Ordering::SeqCst);
        *self.media.write() = Some(media);
    }

    pub fn media(&self) -> Option<MediaDescriptor> {
        self.media.read().clone()
    }

    /// Claim the session slot. False if a session is already running.
    pub fn begin_session(&self) -> bool {
        if self
            .session_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.stop.store(false, Ordering::SeqCst);
        self.seek.lock().take();
        self.state.clear_interrupt();
        true
    }

    /// Release the slot if the engine thread could not be started
    pub fn abandon_session(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.session_active.store(false, Ordering::SeqCst);
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active.load(Ordering::SeqCst)
    }

    /// Reset session fields after teardown. Safe to call more than once.
    pub fn finish_session(&self) {
        *self.media.write() = None;
        self.reported_duration_us.store(0, Ordering::SeqCst);
        self.position_us.store(0, Ordering::SeqCst);
        self.seek.lock().take();
        self.state.set(PlayerState::Stopped);
        self.stop.store(true, Ordering::SeqCst);
        self.session_active.store(false, Ordering::SeqCst);
    }
}
