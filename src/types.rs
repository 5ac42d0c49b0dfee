//! Shared types for call quality analysis and adaptation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Connection state reported by the transport handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Connecting,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl TransportState {
    /// `disconnected` or `failed`
    pub fn is_disconnecting(&self) -> bool {
        matches!(self, TransportState::Disconnected | TransportState::Failed)
    }

    /// `connected` or `completed`
    pub fn is_connected(&self) -> bool {
        matches!(self, TransportState::Connected | TransportState::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::Connecting => "connecting",
            TransportState::Connected => "connected",
            TransportState::Completed => "completed",
            TransportState::Disconnected => "disconnected",
            TransportState::Failed => "failed",
            TransportState::Closed => "closed",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One poll of live transport conditions. Created and discarded every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSample {
    /// Share of lost inbound packets, 0-100
    pub packet_loss_percent: f64,
    pub round_trip_time_ms: f64,
    pub jitter_ms: f64,
    /// 0 when the transport does not know
    pub available_outgoing_bitrate_bps: u64,
    pub transport_state: TransportState,
    /// Set on the first connected sample after a disconnected/failed one
    pub recovered: bool,
}

impl NetworkSample {
    /// A healthy connected sample with no loss
    pub fn connected() -> Self {
        Self {
            packet_loss_percent: 0.0,
            round_trip_time_ms: 0.0,
            jitter_ms: 0.0,
            available_outgoing_bitrate_bps: 0,
            transport_state: TransportState::Connected,
            recovered: false,
        }
    }

    pub fn with_packet_loss(mut self, percent: f64) -> Self {
        self.packet_loss_percent = percent;
        self
    }

    pub fn with_round_trip_time(mut self, ms: f64) -> Self {
        self.round_trip_time_ms = ms;
        self
    }

    pub fn with_state(mut self, state: TransportState) -> Self {
        self.transport_state = state;
        self
    }

    pub fn with_recovered(mut self, recovered: bool) -> Self {
        self.recovered = recovered;
        self
    }

    pub fn is_disconnecting(&self) -> bool {
        self.transport_state.is_disconnecting()
    }
}

/// Pre-call network classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityClassification {
    Excellent,
    Good,
    Fair,
    Poor,
    Offline,
    Unknown,
}

impl QualityClassification {
    /// Ordering used by connection-type overrides; higher is better.
    /// `Offline` and `Unknown` have no rank.
    pub fn rank(&self) -> Option<u8> {
        match self {
            QualityClassification::Excellent => Some(3),
            QualityClassification::Good => Some(2),
            QualityClassification::Fair => Some(1),
            QualityClassification::Poor => Some(0),
            QualityClassification::Offline | QualityClassification::Unknown => None,
        }
    }

    /// Initial route recommended for this classification
    pub fn route(&self) -> CallRoute {
        match self {
            QualityClassification::Excellent => CallRoute::HdVideo,
            QualityClassification::Good => CallRoute::StandardVideo,
            QualityClassification::Fair => CallRoute::AudioOnly,
            QualityClassification::Poor | QualityClassification::Offline => {
                CallRoute::LowBitrateAudio
            }
            QualityClassification::Unknown => CallRoute::StandardVideo,
        }
    }
}

/// Initial media route chosen before the call starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallRoute {
    HdVideo,
    StandardVideo,
    AudioOnly,
    LowBitrateAudio,
}

impl CallRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallRoute::HdVideo => "hd-video",
            CallRoute::StandardVideo => "standard-video",
            CallRoute::AudioOnly => "audio-only",
            CallRoute::LowBitrateAudio => "low-bitrate-audio",
        }
    }

    pub fn has_video(&self) -> bool {
        matches!(self, CallRoute::HdVideo | CallRoute::StandardVideo)
    }
}

impl fmt::Display for CallRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of pre-call route selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAssessment {
    pub classification: QualityClassification,
    pub route: CallRoute,
    /// Measured probe latency, absent when the probe failed or was skipped
    pub latency_ms: Option<f64>,
    pub downlink_mbps: Option<f64>,
}

impl NetworkAssessment {
    /// Neutral default used when measurement fails
    pub fn unknown() -> Self {
        Self {
            classification: QualityClassification::Unknown,
            route: CallRoute::StandardVideo,
            latency_ms: None,
            downlink_mbps: None,
        }
    }
}

/// Optional platform capability. Absence is an explicit variant so callers
/// must handle it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Capability<T> {
    Supported(T),
    Unsupported,
}

impl<T> Capability<T> {
    pub fn supported(&self) -> Option<&T> {
        match self {
            Capability::Supported(value) => Some(value),
            Capability::Unsupported => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported(_))
    }
}

impl<T> Default for Capability<T> {
    fn default() -> Self {
        Capability::Unsupported
    }
}

/// Ambient effective connection type hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectiveConnectionType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

impl FromStr for EffectiveConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(EffectiveConnectionType::Slow2g),
            "2g" => Ok(EffectiveConnectionType::TwoG),
            "3g" => Ok(EffectiveConnectionType::ThreeG),
            "4g" => Ok(EffectiveConnectionType::FourG),
            other => Err(format!("Unknown connection type: {}", other)),
        }
    }
}

/// Ambient connection hints the platform may expose
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectionHints {
    pub online: Capability<bool>,
    pub effective_type: Capability<EffectiveConnectionType>,
    pub downlink_mbps: Capability<f64>,
}

impl ConnectionHints {
    pub fn is_offline(&self) -> bool {
        matches!(self.online, Capability::Supported(false))
    }
}

/// User-visible, auto-dismissing hint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub message: String,
    pub duration_ms: u64,
}

impl Hint {
    pub fn new(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            message: message.into(),
            duration_ms,
        }
    }

    pub fn audio_optimized() -> Self {
        Self::new("Audio optimized", 3000)
    }

    pub fn reconnecting() -> Self {
        Self::new("Reconnecting…", 5000)
    }

    pub fn call_stabilized() -> Self {
        Self::new("Call stabilized", 3000)
    }
}

/// Output of one classification tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CopilotAction {
    None,
    /// Silent; `show_hint` is always false
    ReduceBitrate { show_hint: bool },
    SwitchAudioOnly { show_hint: bool },
    /// Silent; carries no hint flag
    EnableJitterBuffer,
    IceRestart { show_hint: bool },
    ShowHint {
        message: String,
        duration_ms: u64,
        show_hint: bool,
    },
}

impl CopilotAction {
    pub fn show_hint(&self) -> bool {
        match self {
            CopilotAction::None | CopilotAction::EnableJitterBuffer => false,
            CopilotAction::ReduceBitrate { show_hint }
            | CopilotAction::SwitchAudioOnly { show_hint }
            | CopilotAction::IceRestart { show_hint }
            | CopilotAction::ShowHint { show_hint, .. } => *show_hint,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, CopilotAction::None)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CopilotAction::None => "none",
            CopilotAction::ReduceBitrate { .. } => "reduce-bitrate",
            CopilotAction::SwitchAudioOnly { .. } => "switch-audio-only",
            CopilotAction::EnableJitterBuffer => "enable-jitter-buffer",
            CopilotAction::IceRestart { .. } => "ice-restart",
            CopilotAction::ShowHint { .. } => "show-hint",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state_groups() {
        assert!(TransportState::Disconnected.is_disconnecting());
        assert!(TransportState::Failed.is_disconnecting());
        assert!(!TransportState::Closed.is_disconnecting());
        assert!(TransportState::Completed.is_connected());
        assert!(!TransportState::Connecting.is_connected());
    }

    #[test]
    fn test_classification_routes() {
        assert_eq!(QualityClassification::Excellent.route(), CallRoute::HdVideo);
        assert_eq!(QualityClassification::Fair.route(), CallRoute::AudioOnly);
        assert_eq!(QualityClassification::Offline.route(), CallRoute::LowBitrateAudio);
        assert_eq!(QualityClassification::Unknown.route(), CallRoute::StandardVideo);
    }

    #[test]
    fn test_connection_type_parsing() {
        assert_eq!("3g".parse(), Ok(EffectiveConnectionType::ThreeG));
        assert_eq!("Slow-2G".parse(), Ok(EffectiveConnectionType::Slow2g));
        assert!("5g".parse::<EffectiveConnectionType>().is_err());
    }

    #[test]
    fn test_action_serialization() {
        let action = CopilotAction::IceRestart { show_hint: true };
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#"{"type":"ice-restart","show_hint":true}"#);
        assert_eq!(CallRoute::LowBitrateAudio.to_string(), "low-bitrate-audio");
    }
}
