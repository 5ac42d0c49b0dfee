//! Fixed encode presets

use serde::Serialize;

/// Named encode preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityPreset {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Force a key frame every N frames
    pub key_frame_interval_frames: u32,
}

pub const ADAPTIVE_PRESET: &str = "adaptive";

/// Preset table, best first. `adaptive` is the default.
pub const PRESETS: [QualityPreset; 6] = [
    QualityPreset {
        name: "1080p60",
        width: 1920,
        height: 1080,
        frame_rate: 60,
        bitrate: 8_000_000,
        key_frame_interval_frames: 120,
    },
    QualityPreset {
        name: "1080p30",
        width: 1920,
        height: 1080,
        frame_rate: 30,
        bitrate: 5_000_000,
        key_frame_interval_frames: 60,
    },
    QualityPreset {
        name: "720p60",
        width: 1280,
        height: 720,
        frame_rate: 60,
        bitrate: 4_500_000,
        key_frame_interval_frames: 120,
    },
    QualityPreset {
        name: "720p30",
        width: 1280,
        height: 720,
        frame_rate: 30,
        bitrate: 2_500_000,
        key_frame_interval_frames: 60,
    },
    QualityPreset {
        name: "480p30",
        width: 854,
        height: 480,
        frame_rate: 30,
        bitrate: 1_000_000,
        key_frame_interval_frames: 60,
    },
    QualityPreset {
        name: ADAPTIVE_PRESET,
        width: 1280,
        height: 720,
        frame_rate: 30,
        bitrate: 2_000_000,
        key_frame_interval_frames: 60,
    },
];

impl QualityPreset {
    pub fn by_name(name: &str) -> Option<QualityPreset> {
        PRESETS
            .iter()
            .find(|preset| preset.name.eq_ignore_ascii_case(name))
            .copied()
    }

    pub fn adaptive() -> QualityPreset {
        PRESETS[PRESETS.len() - 1]
    }
}

impl Default for QualityPreset {
    fn default() -> Self {
        Self::adaptive()
    }
}
