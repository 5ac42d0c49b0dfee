//! Pre-call route selection
//!
//! A bounded latency probe combined with the platform's ambient connection
//! hints picks the initial call route before any media flows.

use crate::errors::{CopilotError, CopilotResult};
use crate::types::{
    Capability, ConnectionHints, EffectiveConnectionType, NetworkAssessment,
    QualityClassification,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Source of pre-call network measurements
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Ambient hints; every field may be unsupported
    async fn connection_hints(&self) -> ConnectionHints;

    /// One best-effort network round trip
    async fn measure_latency(&self) -> CopilotResult<Duration>;
}

/// Measures latency as the time to complete a TCP handshake with `target`.
pub struct TcpLatencyProbe {
    target: String,
    hints: ConnectionHints,
}

impl TcpLatencyProbe {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            hints: ConnectionHints::default(),
        }
    }

    /// Attach hints supplied by the embedding platform
    pub fn with_hints(mut self, hints: ConnectionHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl NetworkProbe for TcpLatencyProbe {
    async fn connection_hints(&self) -> ConnectionHints {
        self.hints
    }

    async fn measure_latency(&self) -> CopilotResult<Duration> {
        let started = Instant::now();
        let stream = TcpStream::connect(&self.target)
            .await
            .map_err(|e| CopilotError::Probe(format!("connect to {} failed: {}", self.target, e)))?;
        let elapsed = started.elapsed();
        drop(stream);
        Ok(elapsed)
    }
}

/// Classify latency and downlink with the ordered thresholds.
///
/// An unknown downlink does not constrain the result.
pub fn classify(latency_ms: f64, downlink_mbps: Option<f64>) -> QualityClassification {
    let downlink_above = |mbps: f64| downlink_mbps.map_or(true, |d| d > mbps);

    if latency_ms < 50.0 && downlink_above(10.0) {
        QualityClassification::Excellent
    } else if latency_ms < 150.0 && downlink_above(5.0) {
        QualityClassification::Good
    } else if latency_ms < 300.0 && downlink_above(1.0) {
        QualityClassification::Fair
    } else {
        QualityClassification::Poor
    }
}

/// Apply connection-type overrides after threshold classification
pub fn apply_connection_type(
    classification: QualityClassification,
    effective_type: Capability<EffectiveConnectionType>,
) -> QualityClassification {
    match effective_type {
        Capability::Supported(EffectiveConnectionType::ThreeG) => {
            let fair = QualityClassification::Fair.rank();
            if classification.rank() > fair {
                QualityClassification::Fair
            } else {
                classification
            }
        }
        Capability::Supported(EffectiveConnectionType::TwoG)
        | Capability::Supported(EffectiveConnectionType::Slow2g) => QualityClassification::Poor,
        _ => classification,
    }
}

/// Run the pre-call assessment. Never fails; bounded by `timeout`.
///
/// The hints read and the latency measurement share one deadline. Hints that
/// miss it are treated as unavailable.
pub async fn assess_network(probe: &dyn NetworkProbe, timeout: Duration) -> NetworkAssessment {
    let deadline = Instant::now() + timeout;

    let hints = match tokio::time::timeout_at(deadline, probe.connection_hints()).await {
        Ok(hints) => hints,
        Err(_) => {
            log::warn!("Connection hints unavailable within {:?}", timeout);
            ConnectionHints::default()
        }
    };

    if hints.is_offline() {
        log::info!("Network reported offline, recommending low-bitrate audio");
        return NetworkAssessment {
            classification: QualityClassification::Offline,
            route: QualityClassification::Offline.route(),
            latency_ms: None,
            downlink_mbps: None,
        };
    }

    let latency = match tokio::time::timeout_at(deadline, probe.measure_latency()).await {
        Ok(Ok(latency)) => latency,
        Ok(Err(e)) => {
            log::warn!("Latency probe failed, using neutral defaults: {}", e);
            return NetworkAssessment::unknown();
        }
        Err(_) => {
            log::warn!("Latency probe timed out after {:?}, using neutral defaults", timeout);
            return NetworkAssessment::unknown();
        }
    };

    let latency_ms = latency.as_secs_f64() * 1000.0;
    let downlink_mbps = hints.downlink_mbps.supported().copied();
    let classification = apply_connection_type(
        classify(latency_ms, downlink_mbps),
        hints.effective_type,
    );

    log::info!(
        "Pre-call network: {:.0} ms latency, downlink {:?} Mbps -> {:?} / {}",
        latency_ms,
        downlink_mbps,
        classification,
        classification.route()
    );

    NetworkAssessment {
        classification,
        route: classification.route(),
        latency_ms: Some(latency_ms),
        downlink_mbps,
    }
}
