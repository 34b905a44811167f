// Codec type <-> mime type mapping

use symphonia::core::codecs::{self, CodecType};

pub const AUDIO_AAC: &str = "audio/mp4a-latm";
pub const AUDIO_MPEG: &str = "audio/mpeg";
pub const AUDIO_FLAC: &str = "audio/flac";
pub const AUDIO_VORBIS: &str = "audio/vorbis";
pub const AUDIO_OPUS: &str = "audio/opus";
pub const AUDIO_ALAC: &str = "audio/alac";
pub const AUDIO_RAW: &str = "audio/raw";
pub const AUDIO_ADPCM: &str = "audio/adpcm";

/// Every mime type the engine knows how to play
pub const AUDIO_MIMES: &[&str] = &[
    AUDIO_AAC,
    AUDIO_MPEG,
    AUDIO_FLAC,
    AUDIO_VORBIS,
    AUDIO_OPUS,
    AUDIO_ALAC,
    AUDIO_RAW,
    AUDIO_ADPCM,
];

const PCM_CODECS: &[CodecType] = &[
    codecs::CODEC_TYPE_PCM_S16LE,
    codecs::CODEC_TYPE_PCM_S16BE,
    codecs::CODEC_TYPE_PCM_S24LE,
    codecs::CODEC_TYPE_PCM_S24BE,
    codecs::CODEC_TYPE_PCM_S32LE,
    codecs::CODEC_TYPE_PCM_S32BE,
    codecs::CODEC_TYPE_PCM_U8,
    codecs::CODEC_TYPE_PCM_S8,
    codecs::CODEC_TYPE_PCM_U16LE,
    codecs::CODEC_TYPE_PCM_U16BE,
    codecs::CODEC_TYPE_PCM_U24LE,
    codecs::CODEC_TYPE_PCM_U24BE,
    codecs::CODEC_TYPE_PCM_U32LE,
    codecs::CODEC_TYPE_PCM_U32BE,
    codecs::CODEC_TYPE_PCM_F32LE,
    codecs::CODEC_TYPE_PCM_F32BE,
    codecs::CODEC_TYPE_PCM_F64LE,
    codecs::CODEC_TYPE_PCM_F64BE,
    codecs::CODEC_TYPE_PCM_ALAW,
    codecs::CODEC_TYPE_PCM_MULAW,
];

const ADPCM_CODECS: &[CodecType] = &[
    codecs::CODEC_TYPE_ADPCM_IMA_WAV,
    codecs::CODEC_TYPE_ADPCM_MS,
];

const MPEG_CODECS: &[CodecType] = &[
    codecs::CODEC_TYPE_MP1,
    codecs::CODEC_TYPE_MP2,
    codecs::CODEC_TYPE_MP3,
];

/// Mime type for a codec, `None` for codecs this engine does not play
pub fn mime_for_codec(codec: CodecType) -> Option<&'static str> {
    if codec == codecs::CODEC_TYPE_AAC {
        Some(AUDIO_AAC)
    } else if MPEG_CODECS.contains(&codec) {
        Some(AUDIO_MPEG)
    } else if codec == codecs::CODEC_TYPE_FLAC {
        Some(AUDIO_FLAC)
    } else if codec == codecs::CODEC_TYPE_VORBIS {
        Some(AUDIO_VORBIS)
    } else if codec == codecs::CODEC_TYPE_OPUS {
        Some(AUDIO_OPUS)
    } else if codec == codecs::CODEC_TYPE_ALAC {
        Some(AUDIO_ALAC)
    } else if PCM_CODECS.contains(&codec) {
        Some(AUDIO_RAW)
    } else if ADPCM_CODECS.contains(&codec) {
        Some(AUDIO_ADPCM)
    } else {
        None
    }
}

/// Every codec type that maps to `mime`
pub fn codecs_for_mime(mime: &str) -> Vec<CodecType> {
    match mime {
        AUDIO_AAC => vec![codecs::CODEC_TYPE_AAC],
        AUDIO_MPEG => MPEG_CODECS.to_vec(),
        AUDIO_FLAC => vec![codecs::CODEC_TYPE_FLAC],
        AUDIO_VORBIS => vec![codecs::CODEC_TYPE_VORBIS],
        AUDIO_OPUS => vec![codecs::CODEC_TYPE_OPUS],
        AUDIO_ALAC => vec![codecs::CODEC_TYPE_ALAC],
        AUDIO_RAW => PCM_CODECS.to_vec(),
        AUDIO_ADPCM => ADPCM_CODECS.to_vec(),
        _ => Vec::new(),
    }
}
