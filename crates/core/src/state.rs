// Player state management with blocking wait-for-resume

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// No session is running
    Stopped,
    /// A session is open but paused
    ReadyToPlay,
    /// The pump loop is running
    Playing,
}

struct Inner {
    state: PlayerState,
    interrupted: bool,
}

/// Thread-safe player state container
///
/// The engine thread parks in [`wait_if_paused`](Self::wait_if_paused) while the
/// state is [`PlayerState::ReadyToPlay`]. Any `set` that leaves that state wakes it,
/// and so does [`interrupt`](Self::interrupt), which lets a stop request reach a
/// paused pump without pretending to resume it.
#[derive(Clone)]
pub struct PlayerStateContainer {
    inner: Arc<(Mutex<Inner>, Condvar)>,
}

impl PlayerStateContainer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(Inner {
                    state: PlayerState::Stopped,
                    interrupted: false,
                }),
                Condvar::new(),
            )),
        }
    }

    pub fn get(&self) -> PlayerState {
        self.inner.0.lock().state
    }

    pub fn is_stopped(&self) -> bool {
        self.get() == PlayerState::Stopped
    }

    /// Set the state and return the previous one.
    pub fn set(&self, new_state: PlayerState) -> PlayerState {
        let (lock, cvar) = &*self.inner;
        let mut inner = lock.lock();
        let old_state = inner.state;
        inner.state = new_state;
        if old_state == PlayerState::ReadyToPlay && new_state != PlayerState::ReadyToPlay {
            cvar.notify_all();
        }
        drop(inner);

        if old_state != new_state {
            log::debug!("Player state changed: {:?} -> {:?}", old_state, new_state);
        }
        old_state
    }

    /// Set `to` only if the current state is `from`.
    pub fn transition(&self, from: PlayerState, to: PlayerState) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut inner = lock.lock();
        if inner.state != from {
            return false;
        }
        inner.state = to;
        if from == PlayerState::ReadyToPlay && to != PlayerState::ReadyToPlay {
            cvar.notify_all();
        }
        drop(inner);

        log::debug!("Player state changed: {:?} -> {:?}", from, to);
        true
    }

    /// Block while paused. Returns how long the caller was parked.
    ///
    /// Returns early once [`interrupt`](Self::interrupt) has been called; callers
    /// check their stop signal after every return.
    pub fn wait_if_paused(&self) -> Duration {
        let (lock, cvar) = &*self.inner;
        let mut inner = lock.lock();
        if inner.state != PlayerState::ReadyToPlay || inner.interrupted {
            return Duration::ZERO;
        }

        let started = Instant::now();
        while inner.state == PlayerState::ReadyToPlay && !inner.interrupted {
            cvar.wait(&mut inner);
        }
        started.elapsed()
    }

    /// Wake any paused waiter and keep future waits from blocking.
    pub fn interrupt(&self) {
        let (lock, cvar) = &*self.inner;
        lock.lock().interrupted = true;
        cvar.notify_all();
    }

    /// Re-arm pause blocking for a new session.
    pub fn clear_interrupt(&self) {
        self.inner.0.lock().interrupted = false;
    }
}

impl Default for PlayerStateContainer {
    fn default() -> Self {
        Self::new()
    }
}
