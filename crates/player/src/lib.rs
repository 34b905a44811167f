// Tonearm player: playback engine, host API and C ABI

mod backend;
mod engine;
pub mod ffi;
mod logging;
mod player;
mod signals;

pub use backend::PlayerBackend;
pub use logging::init_logging;
pub use player::Player;
pub use signals::SessionSignals;

// Re-export the pieces hosts need alongside a player
pub use tonearm_core::{
    AudioError, AudioPlayer, DataSource, EngineConfig, EventHandler, MediaDescriptor,
    PlayerEvent, PlayerEvents, PlayerState, Result, Task, ThreadHandler,
};
