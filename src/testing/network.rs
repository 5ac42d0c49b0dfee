//! Scripted transport and probe

use crate::errors::{CopilotError, CopilotResult};
use crate::quality::NetworkProbe;
use crate::transport::{StatsReport, Transport};
use crate::types::{Capability, ConnectionHints, EffectiveConnectionType, TransportState};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Transport that replays queued statistics reports.
///
/// Once the queue is drained every read returns the steady report (an empty
/// report by default).
pub struct ScriptedTransport {
    id: String,
    queued: Mutex<VecDeque<CopilotResult<StatsReport>>>,
    steady: Mutex<Option<StatsReport>>,
    state: Mutex<TransportState>,
    stats_reads: AtomicUsize,
    ice_restarts: AtomicUsize,
    jitter_buffer_requests: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            queued: Mutex::new(VecDeque::new()),
            steady: Mutex::new(Some(StatsReport::default())),
            state: Mutex::new(TransportState::Connected),
            stats_reads: AtomicUsize::new(0),
            ice_restarts: AtomicUsize::new(0),
            jitter_buffer_requests: AtomicUsize::new(0),
        }
    }

    pub fn push_report(&self, report: StatsReport) {
        crate::lock(&self.queued).push_back(Ok(report));
    }

    pub fn push_error(&self, message: &str) {
        crate::lock(&self.queued).push_back(Err(CopilotError::Stats(message.to_string())));
    }

    /// Report returned once the queue is empty; `None` makes reads fail
    pub fn set_steady_report(&self, report: Option<StatsReport>) {
        *crate::lock(&self.steady) = report;
    }

    pub fn set_state(&self, state: TransportState) {
        *crate::lock(&self.state) = state;
    }

    pub fn stats_reads(&self) -> usize {
        self.stats_reads.load(Ordering::SeqCst)
    }

    pub fn ice_restarts(&self) -> usize {
        self.ice_restarts.load(Ordering::SeqCst)
    }

    pub fn jitter_buffer_requests(&self) -> usize {
        self.jitter_buffer_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn id(&self) -> &str {
        &self.id
    }

    async fn stats(&self) -> CopilotResult<StatsReport> {
        self.stats_reads.fetch_add(1, Ordering::SeqCst);

        if let Some(next) = crate::lock(&self.queued).pop_front() {
            return next;
        }

        crate::lock(&self.steady)
            .clone()
            .ok_or_else(|| CopilotError::Stats("report unavailable".to_string()))
    }

    fn connection_state(&self) -> TransportState {
        *crate::lock(&self.state)
    }

    async fn restart_ice(&self) -> CopilotResult<()> {
        self.ice_restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn enable_jitter_buffer(&self) -> CopilotResult<()> {
        self.jitter_buffer_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum ProbeOutcome {
    Latency(Duration),
    Fail,
    Hang,
}

/// Probe with fixed answers
#[derive(Debug, Clone)]
pub struct StaticProbe {
    hints: ConnectionHints,
    outcome: ProbeOutcome,
    hints_hang: bool,
}

impl StaticProbe {
    /// Online probe measuring `latency_ms` with a `downlink_mbps` hint
    pub fn new(latency_ms: u64, downlink_mbps: f64) -> Self {
        Self {
            hints: ConnectionHints {
                online: Capability::Supported(true),
                effective_type: Capability::Unsupported,
                downlink_mbps: Capability::Supported(downlink_mbps),
            },
            outcome: ProbeOutcome::Latency(Duration::from_millis(latency_ms)),
            hints_hang: false,
        }
    }

    /// Online probe on a platform that exposes no connection hints
    pub fn latency_only(latency_ms: u64) -> Self {
        Self {
            hints: ConnectionHints::default(),
            outcome: ProbeOutcome::Latency(Duration::from_millis(latency_ms)),
            hints_hang: false,
        }
    }

    pub fn offline() -> Self {
        Self {
            hints: ConnectionHints {
                online: Capability::Supported(false),
                ..ConnectionHints::default()
            },
            outcome: ProbeOutcome::Fail,
            hints_hang: false,
        }
    }

    /// Latency measurement errors out
    pub fn failing() -> Self {
        Self {
            hints: ConnectionHints::default(),
            outcome: ProbeOutcome::Fail,
            hints_hang: false,
        }
    }

    /// Latency measurement never completes
    pub fn hanging() -> Self {
        Self {
            hints: ConnectionHints::default(),
            outcome: ProbeOutcome::Hang,
            hints_hang: false,
        }
    }

    /// The connection hints query never completes
    pub fn with_hanging_hints(mut self) -> Self {
        self.hints_hang = true;
        self
    }

    pub fn with_effective_type(mut self, effective_type: EffectiveConnectionType) -> Self {
        self.hints.effective_type = Capability::Supported(effective_type);
        self
    }
}

#[async_trait]
impl NetworkProbe for StaticProbe {
    async fn connection_hints(&self) -> ConnectionHints {
        if self.hints_hang {
            std::future::pending::<()>().await;
        }
        self.hints
    }

    async fn measure_latency(&self) -> CopilotResult<Duration> {
        match self.outcome {
            ProbeOutcome::Latency(latency) => Ok(latency),
            ProbeOutcome::Fail => Err(CopilotError::Probe("probe target unreachable".to_string())),
            ProbeOutcome::Hang => std::future::pending().await,
        }
    }
}
