// Collaborator factories used by a player

use std::sync::Arc;
use tonearm_decode::{DecoderFactory, SymphoniaDecoderFactory};
use tonearm_demux::{DemuxerFactory, SymphoniaDemuxerFactory};
use tonearm_sink::{AudioSinkFactory, ClockedSinkFactory, CpalSinkFactory};

/// Demuxer, decoder and sink factories for new sessions
#[derive(Clone)]
pub struct PlayerBackend {
    pub demuxers: Arc<dyn DemuxerFactory>,
    pub decoders: Arc<dyn DecoderFactory>,
    pub sinks: Arc<dyn AudioSinkFactory>,
}

impl PlayerBackend {
    pub fn new(
        demuxers: Arc<dyn DemuxerFactory>,
        decoders: Arc<dyn DecoderFactory>,
        sinks: Arc<dyn AudioSinkFactory>,
    ) -> Self {
        Self {
            demuxers,
            decoders,
            sinks,
        }
    }

    /// Symphonia demuxing and decoding into a [`ClockedSinkFactory`] instead of a device
    pub fn headless(paced: bool) -> Self {
        Self::with_sinks(Arc::new(ClockedSinkFactory::new(paced)))
    }

    /// Symphonia demuxing and decoding into the given sinks
    pub fn with_sinks(sinks: Arc<dyn AudioSinkFactory>) -> Self {
        Self::new(
            Arc::new(SymphoniaDemuxerFactory),
            Arc::new(SymphoniaDecoderFactory),
            sinks,
        )
    }
}

impl Default for PlayerBackend {
    /// Symphonia demuxing and decoding, cpal output on the default device
    fn default() -> Self {
        Self::with_sinks(Arc::new(CpalSinkFactory))
    }
}
