//! Codec identifiers, encoder/decoder configuration, and backend contracts

use super::frame::{DecodedFrame, EncodedChunk, VideoFrame};
use super::presets::QualityPreset;
use crate::errors::CopilotResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Video codecs the manager knows how to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCodec {
    H264High,
    H264Main,
    Vp9,
    Vp8,
}

/// Preference order probed for hardware support. The first entry is the
/// software fallback.
pub const CODEC_PREFERENCE: [VideoCodec; 4] = [
    VideoCodec::H264High,
    VideoCodec::H264Main,
    VideoCodec::Vp9,
    VideoCodec::Vp8,
];

impl VideoCodec {
    /// RFC 6381 style codec string
    pub fn codec_string(&self) -> &'static str {
        match self {
            VideoCodec::H264High => "avc1.640028",
            VideoCodec::H264Main => "avc1.4d0028",
            VideoCodec::Vp9 => "vp09.00.10.08",
            VideoCodec::Vp8 => "vp8",
        }
    }

    pub fn is_h264(&self) -> bool {
        matches!(self, VideoCodec::H264High | VideoCodec::H264Main)
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codec_string())
    }
}

/// Result of a capability query for one configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodecSupport {
    Hardware,
    Software,
    Unsupported,
}

/// Lifecycle of an encoder or decoder backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodecState {
    Unconfigured,
    Configured,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardwareAcceleration {
    PreferHardware,
    PreferSoftware,
    NoPreference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatencyMode {
    Realtime,
    Quality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitrateMode {
    Variable,
    Constant,
}

/// Encode parameters, fixed for the encoder's lifetime apart from bitrate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Bits per second
    pub bitrate: u32,
    pub key_frame_interval_frames: u32,
    pub hardware_acceleration: HardwareAcceleration,
    pub latency_mode: LatencyMode,
    pub bitrate_mode: BitrateMode,
}

impl EncoderConfig {
    /// Realtime VBR configuration for `preset`
    pub fn from_preset(preset: &QualityPreset, codec: VideoCodec) -> Self {
        Self {
            codec,
            width: preset.width,
            height: preset.height,
            frame_rate: preset.frame_rate,
            bitrate: preset.bitrate,
            key_frame_interval_frames: preset.key_frame_interval_frames.max(1),
            hardware_acceleration: HardwareAcceleration::PreferHardware,
            latency_mode: LatencyMode::Realtime,
            bitrate_mode: BitrateMode::Variable,
        }
    }

    pub fn with_codec(&self, codec: VideoCodec) -> Self {
        Self {
            codec,
            ..self.clone()
        }
    }

    pub fn with_acceleration(mut self, acceleration: HardwareAcceleration) -> Self {
        self.hardware_acceleration = acceleration;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub codec: VideoCodec,
    pub hardware_acceleration: HardwareAcceleration,
}

/// Platform video encoder
pub trait EncoderBackend: Send {
    fn name(&self) -> &str;

    /// Capability query; must not change backend state
    fn probe(&self, config: &EncoderConfig) -> CodecSupport;

    fn configure(&mut self, config: &EncoderConfig) -> CopilotResult<()>;

    fn encode(&mut self, frame: &VideoFrame, key_frame: bool) -> CopilotResult<EncodedChunk>;

    fn set_bitrate(&mut self, bitrate: u32) -> CopilotResult<()>;

    /// Drain pending output
    fn flush(&mut self) -> CopilotResult<Vec<EncodedChunk>>;

    fn close(&mut self);

    fn state(&self) -> CodecState;
}

/// Platform video decoder
pub trait DecoderBackend: Send {
    fn name(&self) -> &str;

    fn probe(&self, config: &DecoderConfig) -> CodecSupport;

    fn configure(&mut self, config: &DecoderConfig) -> CopilotResult<()>;

    /// `Ok(None)` when the chunk produced no picture yet
    fn decode(&mut self, chunk: &EncodedChunk) -> CopilotResult<Option<DecodedFrame>>;

    fn flush(&mut self) -> CopilotResult<Vec<DecodedFrame>>;

    fn close(&mut self);

    fn state(&self) -> CodecState;
}

/// Codec picked for an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecChoice {
    pub codec: VideoCodec,
    pub hardware_accelerated: bool,
}

/// Walk [`CODEC_PREFERENCE`] for the first hardware-accelerated codec,
/// falling back to the first entry in software mode.
pub fn select_codec(
    backend: &dyn EncoderBackend,
    base: &EncoderConfig,
    prefer_hardware: bool,
) -> CodecChoice {
    if prefer_hardware {
        for codec in CODEC_PREFERENCE {
            let candidate = base
                .with_codec(codec)
                .with_acceleration(HardwareAcceleration::PreferHardware);
            if backend.probe(&candidate) == CodecSupport::Hardware {
                return CodecChoice {
                    codec,
                    hardware_accelerated: true,
                };
            }
        }
    }

    CodecChoice {
        codec: CODEC_PREFERENCE[0],
        hardware_accelerated: false,
    }
}
