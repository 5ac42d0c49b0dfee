//! Testing utilities for the call copilot
//!
//! Scripted stand-ins for the transport, the latency probe, codec backends
//! and the capture track, so the engine and the encoder manager can be
//! exercised without a network or camera.

pub mod media;
pub mod network;
pub mod synthetic_data;

pub use media::{
    CollectingSink, EncoderLog, EncoderLogHandle, FrameTracker, ScriptedDecoderBackend,
    ScriptedEncoderBackend, SyntheticFrameSource,
};
pub use network::{ScriptedTransport, StaticProbe};
pub use synthetic_data::{synthetic_stats_report, synthetic_video_frame};
