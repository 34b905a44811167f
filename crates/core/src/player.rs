// Host-facing audio player trait

use crate::callback::PlayerEvents;
use crate::error::Result;
use crate::media::DataSource;
use crate::state::PlayerState;
use std::sync::Arc;

/// Core audio player trait
/// Command methods never block on the engine thread
pub trait AudioPlayer: Send {
    /// Set the source for the next session
    fn set_data_source(&mut self, source: DataSource);

    /// Set or clear the event listener
    fn set_events_listener(&mut self, listener: Option<Arc<dyn PlayerEvents>>);

    /// Restart from the beginning at end of stream instead of stopping
    fn set_loop(&mut self, looping: bool);

    /// Start a session when stopped, resume when paused
    fn play(&mut self) -> Result<()>;

    /// Pause a playing session
    fn pause(&mut self);

    /// Request the session to stop
    fn stop(&mut self);

    /// Seek to the sync point nearest `position_us`
    fn seek(&mut self, position_us: u64);

    /// Seek to a percentage of the reported duration
    fn seek_percent(&mut self, percent: u32);

    /// Fallback target duration if configured, the reported one otherwise (µs)
    fn duration(&self) -> u64;

    /// True when the source reports no duration
    fn is_live(&self) -> bool;

    /// Current player state
    fn state(&self) -> PlayerState;
}
