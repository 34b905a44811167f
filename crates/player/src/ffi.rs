// C ABI for embedding hosts

use crate::logging::init_logging;
use crate::player::Player;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::sync::Arc;
use tonearm_core::{AudioError, AudioPlayer, DataSource, PlayerEvents, Result};

pub const EVENT_START: i32 = 0;
pub const EVENT_PLAY: i32 = 1;
pub const EVENT_PLAY_UPDATE: i32 = 2;
pub const EVENT_STOP: i32 = 3;
pub const EVENT_ERROR: i32 = 4;

/// Event callback.
///
/// `text` is the mime type for `EVENT_START`, the message for `EVENT_ERROR` and
/// null otherwise; it is only valid for the duration of the call.
///
/// | kind | a | b | c |
/// |---|---|---|---|
/// | `EVENT_START` | sample rate | channels | duration ms |
/// | `EVENT_PLAY_UPDATE` | percent | current ms | total ms |
pub type EventCallback = extern "C" fn(
    kind: i32,
    text: *const c_char,
    a: i64,
    b: i64,
    c: i64,
    user_data: *mut c_void,
);

static PLAYER_REGISTRY: Lazy<Mutex<HashMap<i64, Player>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_PLAYER_ID: Lazy<Mutex<i64>> = Lazy::new(|| Mutex::new(1));

/// Forwards events to a C callback
struct CallbackBridge {
    callback: EventCallback,
    user_data: usize,
}

impl CallbackBridge {
    fn emit(&self, kind: i32, text: Option<&str>, a: i64, b: i64, c: i64) {
        let text = text.and_then(|t| CString::new(t).ok());
        let ptr = text.as_ref().map_or(std::ptr::null(), |t| t.as_ptr());
        (self.callback)(kind, ptr, a, b, c, self.user_data as *mut c_void);
    }
}

impl PlayerEvents for CallbackBridge {
    fn on_start(&self, mime: &str, sample_rate: u32, channels: u16, duration_ms: u64) {
        self.emit(
            EVENT_START,
            Some(mime),
            sample_rate as i64,
            channels as i64,
            duration_ms as i64,
        );
    }

    fn on_play(&self) {
        self.emit(EVENT_PLAY, None, 0, 0, 0);
    }

    fn on_play_update(&self, percent: u32, current_ms: u64, total_ms: u64) {
        self.emit(
            EVENT_PLAY_UPDATE,
            None,
            percent as i64,
            current_ms as i64,
            total_ms as i64,
        );
    }

    fn on_stop(&self) {
        self.emit(EVENT_STOP, None, 0, 0, 0);
    }

    fn on_error(&self, error: &AudioError) {
        self.emit(EVENT_ERROR, Some(&error.to_string()), 0, 0, 0);
    }
}

fn register_player(player: Player) -> i64 {
    let mut next = NEXT_PLAYER_ID.lock();
    let id = *next;
    *next += 1;
    drop(next);

    PLAYER_REGISTRY.lock().insert(id, player);
    id
}

fn with_player_mut<R>(id: i64, f: impl FnOnce(&mut Player) -> Result<R>) -> Result<R> {
    let mut registry = PLAYER_REGISTRY.lock();
    let player = registry
        .get_mut(&id)
        .ok_or_else(|| AudioError::InvalidState("Invalid player ID".into()))?;
    f(player)
}

fn with_player<R>(id: i64, f: impl FnOnce(&Player) -> R) -> Result<R> {
    let registry = PLAYER_REGISTRY.lock();
    let player = registry
        .get(&id)
        .ok_or_else(|| AudioError::InvalidState("Invalid player ID".into()))?;
    Ok(f(player))
}

fn to_code(result: Result<()>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string
unsafe fn read_str<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(AudioError::InvalidState("Null string argument".into()));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| AudioError::InvalidState(format!("Invalid UTF-8 argument: {}", e)))
}

/// Create a player on the default backend; returns its handle or -1
#[no_mangle]
pub extern "C" fn tonearm_player_create() -> i64 {
    init_logging();
    match Player::new() {
        Ok(player) => register_player(player),
        Err(err) => {
            log::error!("Failed to create player: {}", err);
            -1
        }
    }
}

/// Set a path or `http(s)://` URL as the source
///
/// # Safety
/// `source` must be null or point to a NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn tonearm_player_set_data_source(player_id: i64, source: *const c_char) -> i32 {
    let source = match read_str(source) {
        Ok(source) => DataSource::parse(source),
        Err(err) => return to_code(Err(err)),
    };
    to_code(with_player_mut(player_id, |p| {
        p.set_data_source(source);
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn tonearm_player_set_loop(player_id: i64, looping: bool) -> i32 {
    to_code(with_player_mut(player_id, |p| {
        p.set_loop(looping);
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn tonearm_player_play(player_id: i64) -> i32 {
    to_code(with_player_mut(player_id, |p| p.play()))
}

#[no_mangle]
pub extern "C" fn tonearm_player_pause(player_id: i64) -> i32 {
    to_code(with_player_mut(player_id, |p| {
        p.pause();
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn tonearm_player_stop(player_id: i64) -> i32 {
    to_code(with_player_mut(player_id, |p| {
        p.stop();
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn tonearm_player_seek(player_id: i64, position_us: i64) -> i32 {
    if position_us < 0 {
        return to_code(Err(AudioError::InvalidState(format!(
            "Negative seek position: {}",
            position_us
        ))));
    }
    to_code(with_player_mut(player_id, |p| {
        p.seek(position_us as u64);
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn tonearm_player_seek_percent(player_id: i64, percent: i32) -> i32 {
    to_code(with_player_mut(player_id, |p| {
        p.seek_percent(percent.clamp(0, 100) as u32);
        Ok(())
    }))
}

/// Duration in microseconds, 0 for live sources, -1 for an unknown handle
#[no_mangle]
pub extern "C" fn tonearm_player_get_duration(player_id: i64) -> i64 {
    match with_player(player_id, |p| p.duration()) {
        Ok(duration) => duration as i64,
        Err(err) => {
            log::error!("Failed to get duration: {}", err);
            -1
        }
    }
}

/// 1 when live, 0 when not, -1 for an unknown handle
#[no_mangle]
pub extern "C" fn tonearm_player_is_live(player_id: i64) -> i32 {
    match with_player(player_id, |p| p.is_live()) {
        Ok(live) => live as i32,
        Err(err) => {
            log::error!("Failed to query live state: {}", err);
            -1
        }
    }
}

/// Install `callback`, or clear it when null
///
/// `user_data` is passed back untouched; the callback runs on the event thread.
#[no_mangle]
pub extern "C" fn tonearm_player_set_event_callback(
    player_id: i64,
    callback: Option<EventCallback>,
    user_data: *mut c_void,
) -> i32 {
    let listener = callback.map(|callback| {
        Arc::new(CallbackBridge {
            callback,
            user_data: user_data as usize,
        }) as Arc<dyn PlayerEvents>
    });
    to_code(with_player_mut(player_id, |p| {
        p.set_events_listener(listener);
        Ok(())
    }))
}

/// Stop playback and free the handle
#[no_mangle]
pub extern "C" fn tonearm_player_release(player_id: i64) -> i32 {
    let player = PLAYER_REGISTRY.lock().remove(&player_id);
    match player {
        // Drop joins the engine thread outside the registry lock
        Some(player) => {
            drop(player);
            0
        }
        None => to_code(Err(AudioError::InvalidState("Invalid player ID".into()))),
    }
}
