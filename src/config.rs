//! Configuration management for the call copilot
//!
//! Provides configuration loading, saving, and validation for the monitoring
//! loop, the pre-call probe, and the encoder manager. Decision thresholds are
//! fixed constants in `quality::policy` and are not configurable.

use crate::encoder::presets::QualityPreset;
use crate::errors::CopilotError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    pub monitor: MonitorConfig,
    pub probe: ProbeConfig,
    pub encoder: EncoderSettings,
}

/// Mid-call monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Stats polling interval in milliseconds
    pub interval_ms: u64,
    /// Minimum gap between two user-visible hints in milliseconds
    pub hint_cooldown_ms: u64,
}

/// Pre-call latency probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// `host:port` the latency probe connects to
    pub target: String,
    /// Upper bound on the probe in milliseconds
    pub timeout_ms: u64,
}

/// Encoder manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// Preset used when the caller does not name one
    pub default_preset: String,
    /// Report encoder stats every N encoded frames
    pub stats_interval_frames: u64,
    /// Request hardware-accelerated encode paths
    pub prefer_hardware: bool,
    /// Multiplier applied to the target bitrate on a reduce-bitrate action
    pub bitrate_reduction_factor: f64,
    /// Floor for relayed bitrate reductions (bps)
    pub min_bitrate_bps: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            hint_cooldown_ms: 15_000,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target: "1.1.1.1:443".to_string(),
            timeout_ms: 3000,
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            default_preset: "adaptive".to_string(),
            stats_interval_frames: 30,
            prefer_hardware: true,
            bitrate_reduction_factor: 0.7,
            min_bitrate_bps: 150_000,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CopilotConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CopilotError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: CopilotConfig = toml::from_str(&contents).map_err(|e| {
            CopilotError::Configuration(format!("Failed to parse config file: {}", e))
        })?;

        config.validate().map_err(CopilotError::Configuration)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CopilotError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            CopilotError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("call-copilot.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.monitor.interval_ms == 0 {
            return Err("Monitor interval must be greater than zero".to_string());
        }

        if self.probe.timeout_ms == 0 || self.probe.timeout_ms > 30_000 {
            return Err("Probe timeout must be between 1 and 30000 ms".to_string());
        }
        if self.probe.target.trim().is_empty() {
            return Err("Probe target must not be empty".to_string());
        }

        if QualityPreset::by_name(&self.encoder.default_preset).is_none() {
            return Err(format!(
                "Unknown encoder preset: {}",
                self.encoder.default_preset
            ));
        }
        if self.encoder.stats_interval_frames == 0 {
            return Err("Stats interval must be at least one frame".to_string());
        }
        let factor = self.encoder.bitrate_reduction_factor;
        if !(factor > 0.0 && factor <= 1.0) {
            return Err("Bitrate reduction factor must be in (0, 1]".to_string());
        }

        Ok(())
    }
}
