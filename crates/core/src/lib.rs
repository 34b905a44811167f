// Core types and traits for the Tonearm playback engine

pub mod callback;
pub mod config;
pub mod error;
pub mod media;
pub mod player;
pub mod state;

// Re-export commonly used types
pub use callback::{
    EventDispatcher, EventHandler, PlayerEvent, PlayerEvents, ProgressThrottle, Task,
    ThreadHandler,
};
pub use config::EngineConfig;
pub use error::{AudioError, Result};
pub use media::{DataSource, MediaDescriptor};
pub use player::AudioPlayer;
pub use state::{PlayerState, PlayerStateContainer};
