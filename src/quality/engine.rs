//! Quality Decision Engine
//!
//! Samples the bound transport on a fixed interval, classifies each sample
//! and emits one adaptation action per tick. All hint bookkeeping for a call
//! lives in one owned state struct that is cleared by [`CallCopilot::reset`].

use super::hints::HintBoard;
use super::policy::{self, HintState};
use super::probe::{self, NetworkProbe};
use crate::config::MonitorConfig;
use crate::timing::{Clock, MonotonicClock, RepeatingTimer};
use crate::transport::{StatsReport, Transport};
use crate::types::{
    CallRoute, CopilotAction, Hint, NetworkAssessment, NetworkSample, QualityClassification,
    TransportState,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Build a sample from a statistics snapshot.
///
/// `previous_state` is the state observed on the prior poll; `recovered` is
/// set only when the transport returns to connected straight from
/// disconnected or failed.
pub fn sample_from_report(
    report: &StatsReport,
    state: TransportState,
    previous_state: Option<TransportState>,
) -> NetworkSample {
    let mut lost: u64 = 0;
    let mut received: u64 = 0;
    let mut jitter_secs = 0.0;

    for inbound in report.inbound_rtp() {
        lost += inbound.packets_lost.max(0) as u64;
        received += inbound.packets_received;
        jitter_secs += inbound.jitter;
    }

    let packet_loss_percent = if lost + received > 0 {
        lost as f64 / (lost + received) as f64 * 100.0
    } else {
        0.0
    };

    let (round_trip_time_ms, available_outgoing_bitrate_bps) = report
        .active_candidate_pair()
        .map(|pair| {
            (
                pair.current_round_trip_time.unwrap_or(0.0) * 1000.0,
                pair.available_outgoing_bitrate.unwrap_or(0.0).max(0.0) as u64,
            )
        })
        .unwrap_or((0.0, 0));

    let recovered = state.is_connected()
        && previous_state.is_some_and(|previous| previous.is_disconnecting());

    NetworkSample {
        packet_loss_percent,
        round_trip_time_ms,
        jitter_ms: jitter_secs * 1000.0,
        available_outgoing_bitrate_bps,
        transport_state: state,
        recovered,
    }
}

#[derive(Debug, Default)]
struct CallState {
    hints: HintState,
    last_transport_state: Option<TransportState>,
}

struct EngineInner {
    cooldown_ms: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<CallState>,
    hints: HintBoard,
    assessment: Mutex<Option<NetworkAssessment>>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    action_sender: broadcast::Sender<CopilotAction>,
}

impl EngineInner {
    async fn collect_stats(&self) -> Option<NetworkSample> {
        let transport = crate::lock(&self.transport).clone()?;

        let report = match transport.stats().await {
            Ok(report) => report,
            Err(e) if e.is_measurement() => {
                log::debug!("Stats unavailable for transport {}: {}", transport.id(), e);
                return None;
            }
            Err(e) => {
                log::warn!("Stats read failed on transport {}: {}", transport.id(), e);
                return None;
            }
        };

        let state = transport.connection_state();
        let previous = crate::lock(&self.state).last_transport_state.replace(state);
        Some(sample_from_report(&report, state, previous))
    }

    fn analyze_call_stats(&self, sample: &NetworkSample) -> CopilotAction {
        let now = self.clock.now_ms();
        let decision = {
            let mut state = crate::lock(&self.state);
            policy::decide(sample, &mut state.hints, now, self.cooldown_ms)
        };

        log::debug!(
            "Sample loss={:.1}% rtt={:.0}ms jitter={:.1}ms state={} -> {}",
            sample.packet_loss_percent,
            sample.round_trip_time_ms,
            sample.jitter_ms,
            sample.transport_state,
            decision.action.kind()
        );

        if let Some(hint) = decision.hint {
            self.hints.show(hint);
        }

        if !decision.action.is_none() {
            log::info!("Copilot action: {}", decision.action.kind());
            // No subscribers is fine; the action is still returned.
            let _ = self.action_sender.send(decision.action.clone());
        }

        decision.action
    }

    async fn tick(&self) {
        if let Some(sample) = self.collect_stats().await {
            self.analyze_call_stats(&sample);
        }
    }
}

/// The Call Quality Copilot's decision engine
#[derive(Clone)]
pub struct CallCopilot {
    inner: Arc<EngineInner>,
    interval: Duration,
    monitor: Arc<Mutex<Option<RepeatingTimer>>>,
}

impl CallCopilot {
    pub fn new(config: &MonitorConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: &MonitorConfig, clock: Arc<dyn Clock>) -> Self {
        let (action_sender, _) = broadcast::channel(32);

        Self {
            inner: Arc::new(EngineInner {
                cooldown_ms: config.hint_cooldown_ms,
                hints: HintBoard::new(Arc::clone(&clock)),
                clock,
                state: Mutex::new(CallState::default()),
                assessment: Mutex::new(None),
                transport: Mutex::new(None),
                action_sender,
            }),
            interval: config.interval(),
            monitor: Arc::new(Mutex::new(None)),
        }
    }

    /// Pre-call route selection, bounded by `timeout`. Never fails.
    pub async fn analyze_network_quality(
        &self,
        probe: &dyn NetworkProbe,
        timeout: Duration,
    ) -> NetworkAssessment {
        let assessment = probe::assess_network(probe, timeout).await;
        *crate::lock(&self.inner.assessment) = Some(assessment.clone());
        assessment
    }

    /// Bind `transport` and start polling it. Restarting replaces the
    /// previous timer.
    ///
    /// Returns `false` when called outside a tokio runtime or with a zero
    /// polling interval.
    pub fn start_monitoring(&self, transport: Arc<dyn Transport>) -> bool {
        self.stop_monitoring();

        if tokio::runtime::Handle::try_current().is_err() {
            log::warn!("Cannot start monitoring outside a tokio runtime");
            return false;
        }
        if self.interval.is_zero() {
            log::warn!("Cannot start monitoring with a zero polling interval");
            return false;
        }

        log::info!(
            "Starting call quality monitoring for transport {} every {:?}",
            transport.id(),
            self.interval
        );
        *crate::lock(&self.inner.transport) = Some(transport);

        let inner = Arc::clone(&self.inner);
        let timer = RepeatingTimer::start(self.interval, move || {
            let inner = Arc::clone(&inner);
            async move { inner.tick().await }
        });
        *crate::lock(&self.monitor) = Some(timer);
        true
    }

    /// Stop polling. Safe to call repeatedly.
    pub fn stop_monitoring(&self) {
        if let Some(mut timer) = crate::lock(&self.monitor).take() {
            timer.stop();
            log::info!("Stopped call quality monitoring");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        crate::lock(&self.monitor)
            .as_ref()
            .is_some_and(RepeatingTimer::is_running)
    }

    /// Read one sample from the bound transport.
    ///
    /// `None` when no transport is bound or its report is unreadable.
    pub async fn collect_stats(&self) -> Option<NetworkSample> {
        self.inner.collect_stats().await
    }

    /// Run the decision list on `sample`, updating hint state and
    /// broadcasting the action.
    pub fn analyze_call_stats(&self, sample: &NetworkSample) -> CopilotAction {
        self.inner.analyze_call_stats(sample)
    }

    /// Call teardown: stop the monitor and forget everything about the call.
    pub fn reset(&self) {
        self.stop_monitoring();
        *crate::lock(&self.inner.state) = CallState::default();
        *crate::lock(&self.inner.assessment) = None;
        *crate::lock(&self.inner.transport) = None;
        self.inner.hints.clear();
        log::debug!("Copilot state reset");
    }

    pub fn current_hint(&self) -> Option<Hint> {
        self.inner.hints.current()
    }

    pub fn network_quality(&self) -> QualityClassification {
        crate::lock(&self.inner.assessment)
            .as_ref()
            .map(|assessment| assessment.classification)
            .unwrap_or(QualityClassification::Unknown)
    }

    pub fn recommended_route(&self) -> CallRoute {
        crate::lock(&self.inner.assessment)
            .as_ref()
            .map(|assessment| assessment.route)
            .unwrap_or(CallRoute::StandardVideo)
    }

    pub fn assessment(&self) -> Option<NetworkAssessment> {
        crate::lock(&self.inner.assessment).clone()
    }

    /// Snapshot of the hint bookkeeping
    pub fn hint_state(&self) -> HintState {
        crate::lock(&self.inner.state).hints.clone()
    }

    pub fn subscribe_actions(&self) -> broadcast::Receiver<CopilotAction> {
        self.inner.action_sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{CandidatePairStats, InboundRtpStats, StatsRecord};

    fn inbound(id: &str, lost: i64, received: u64, jitter: f64) -> StatsRecord {
        StatsRecord::InboundRtp(InboundRtpStats {
            id: id.to_string(),
            packets_lost: lost,
            packets_received: received,
            jitter,
        })
    }

    #[test]
    fn test_sample_sums_inbound_streams() {
        let report = StatsReport::new(vec![
            inbound("audio", 5, 95, 0.010),
            inbound("video", 15, 85, 0.020),
            StatsRecord::CandidatePair(CandidatePairStats {
                id: "pair".into(),
                nominated: true,
                succeeded: true,
                current_round_trip_time: Some(0.120),
                available_outgoing_bitrate: Some(1_500_000.0),
            }),
        ]);

        let sample = sample_from_report(&report, TransportState::Connected, None);
        assert!((sample.packet_loss_percent - 10.0).abs() < 1e-9);
        assert!((sample.jitter_ms - 30.0).abs() < 1e-9);
        assert!((sample.round_trip_time_ms - 120.0).abs() < 1e-9);
        assert_eq!(sample.available_outgoing_bitrate_bps, 1_500_000);
        assert!(!sample.recovered);
    }

    #[test]
    fn test_sample_without_packets() {
        let sample = sample_from_report(&StatsReport::default(), TransportState::Connecting, None);
        assert_eq!(sample.packet_loss_percent, 0.0);
        assert_eq!(sample.round_trip_time_ms, 0.0);
        assert_eq!(sample.available_outgoing_bitrate_bps, 0);
    }

    #[test]
    fn test_negative_loss_is_clamped() {
        let report = StatsReport::new(vec![inbound("dup", -3, 100, 0.0)]);
        let sample = sample_from_report(&report, TransportState::Connected, None);
        assert_eq!(sample.packet_loss_percent, 0.0);
    }

    #[test]
    fn test_recovered_only_after_disconnect() {
        let report = StatsReport::default();
        let after_failure = sample_from_report(
            &report,
            TransportState::Completed,
            Some(TransportState::Failed),
        );
        assert!(after_failure.recovered);

        let steady = sample_from_report(
            &report,
            TransportState::Connected,
            Some(TransportState::Connected),
        );
        assert!(!steady.recovered);

        let disconnected = sample_from_report(
            &report,
            TransportState::Disconnected,
            Some(TransportState::Connected),
        );
        assert!(disconnected.is_disconnecting());
        assert!(!disconnected.recovered);
    }

    #[tokio::test]
    async fn test_collect_stats_without_transport() {
        let copilot = CallCopilot::new(&MonitorConfig::default());
        assert!(copilot.collect_stats().await.is_none());
    }

    #[test]
    fn test_defaults_before_assessment() {
        let copilot = CallCopilot::new(&MonitorConfig::default());
        assert_eq!(copilot.network_quality(), QualityClassification::Unknown);
        assert_eq!(copilot.recommended_route(), CallRoute::StandardVideo);
        assert!(copilot.current_hint().is_none());
        assert!(!copilot.is_monitoring());
    }
}
