/// Outgoing video encode path
///
/// Codec selection, the preset table, frame plumbing, the encoder manager's
/// pull loop, and the matching decoder.
pub mod codec;
pub mod decoder;
pub mod frame;
pub mod manager;
pub mod presets;

#[cfg(feature = "software-codec")]
pub mod software;

pub use codec::{
    select_codec, CodecChoice, CodecState, CodecSupport, DecoderBackend, DecoderConfig,
    EncoderBackend, EncoderConfig, HardwareAcceleration, VideoCodec, CODEC_PREFERENCE,
};
pub use decoder::HardwareDecoder;
pub use frame::{ChunkSink, DecodedFrame, EncodedChunk, FrameSource, PixelFormat, VideoFrame};
pub use manager::{EncoderStats, HardwareEncoderManager};
pub use presets::{QualityPreset, PRESETS};

#[cfg(feature = "software-codec")]
pub use software::{OpenH264Decoder, OpenH264Encoder};
