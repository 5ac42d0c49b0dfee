//! Transport handle contract
//!
//! The copilot only observes an already-connected peer transport: it reads
//! statistics snapshots and the connection state, and asks for a couple of
//! recovery operations. Signaling and ICE mechanics stay with the transport.

pub mod registry;

pub use registry::ConnectionRegistry;

use crate::errors::CopilotResult;
use crate::types::TransportState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Statistics for one inbound RTP stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundRtpStats {
    pub id: String,
    /// Cumulative; may be negative when duplicates outnumber losses
    pub packets_lost: i64,
    pub packets_received: u64,
    /// Seconds
    pub jitter: f64,
}

/// Statistics for one ICE candidate pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePairStats {
    pub id: String,
    pub nominated: bool,
    pub succeeded: bool,
    /// Seconds
    pub current_round_trip_time: Option<f64>,
    /// Bits per second
    pub available_outgoing_bitrate: Option<f64>,
}

impl CandidatePairStats {
    /// The pair carrying media right now
    pub fn is_active(&self) -> bool {
        self.nominated && self.succeeded
    }
}

/// One record in a statistics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatsRecord {
    InboundRtp(InboundRtpStats),
    CandidatePair(CandidatePairStats),
    /// Any record kind the copilot does not consume
    Other { id: String, kind: String },
}

/// Statistics snapshot returned by the transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub records: Vec<StatsRecord>,
}

impl StatsReport {
    pub fn new(records: Vec<StatsRecord>) -> Self {
        Self { records }
    }

    pub fn inbound_rtp(&self) -> impl Iterator<Item = &InboundRtpStats> {
        self.records.iter().filter_map(|record| match record {
            StatsRecord::InboundRtp(stats) => Some(stats),
            _ => None,
        })
    }

    pub fn active_candidate_pair(&self) -> Option<&CandidatePairStats> {
        self.records.iter().find_map(|record| match record {
            StatsRecord::CandidatePair(pair) if pair.is_active() => Some(pair),
            _ => None,
        })
    }
}

/// Live peer transport as seen by the copilot
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable identifier, used as the registry key
    fn id(&self) -> &str;

    /// Statistics snapshot across all streams and candidate pairs
    async fn stats(&self) -> CopilotResult<StatsReport>;

    /// Current connection state
    fn connection_state(&self) -> TransportState;

    /// Renegotiate connectivity candidates
    async fn restart_ice(&self) -> CopilotResult<()> {
        log::debug!("Transport {} does not support ICE restart", self.id());
        Ok(())
    }

    /// Grow the receive-side jitter buffer
    async fn enable_jitter_buffer(&self) -> CopilotResult<()> {
        log::debug!("Transport {} has no jitter buffer control", self.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(id: &str, nominated: bool, rtt: f64) -> StatsRecord {
        StatsRecord::CandidatePair(CandidatePairStats {
            id: id.to_string(),
            nominated,
            succeeded: true,
            current_round_trip_time: Some(rtt),
            available_outgoing_bitrate: None,
        })
    }

    #[test]
    fn test_active_pair_selection() {
        let report = StatsReport::new(vec![
            pair("backup", false, 0.9),
            StatsRecord::Other {
                id: "codec-1".into(),
                kind: "codec".into(),
            },
            pair("active", true, 0.05),
        ]);

        let active = report.active_candidate_pair().unwrap();
        assert_eq!(active.id, "active");
        assert_eq!(report.inbound_rtp().count(), 0);
    }

    #[test]
    fn test_empty_report() {
        let report = StatsReport::default();
        assert!(report.active_candidate_pair().is_none());
    }
}
