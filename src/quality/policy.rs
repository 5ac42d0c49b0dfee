//! Mid-call classification and action policy
//!
//! The decision list is evaluated in a fixed order and the first match wins.
//! The recovery-trend check runs afterwards regardless of which rule matched,
//! because it looks at the change between samples rather than the sample alone.

use crate::types::{CopilotAction, Hint, NetworkSample};
use serde::{Deserialize, Serialize};

/// Loss above this (and up to `AUDIO_ONLY_LOSS_PERCENT`) silently reduces bitrate
pub const REDUCE_BITRATE_LOSS_PERCENT: f64 = 10.0;
/// Loss above this drops video
pub const AUDIO_ONLY_LOSS_PERCENT: f64 = 25.0;
/// Round-trip time above this enables the jitter buffer
pub const JITTER_BUFFER_RTT_MS: f64 = 500.0;
/// Loss below this after a lossy sample counts as a recovery trend
pub const RECOVERY_LOSS_PERCENT: f64 = 2.0;
/// Minimum gap between two user-visible hints
pub const DEFAULT_HINT_COOLDOWN_MS: u64 = 15_000;

/// Per-call hint bookkeeping. Written only by [`decide`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HintState {
    /// Clock time of the last user-visible hint
    pub last_hint_at_ms: Option<u64>,
    pub recovered_recently: bool,
    pub previous_packet_loss: f64,
}

impl HintState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn cooldown_elapsed(&self, now_ms: u64, cooldown_ms: u64) -> bool {
        match self.last_hint_at_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= cooldown_ms,
        }
    }

    /// Claim the hint slot if the cooldown allows it
    fn try_claim(&mut self, now_ms: u64, cooldown_ms: u64) -> bool {
        if self.cooldown_elapsed(now_ms, cooldown_ms) {
            self.last_hint_at_ms = Some(now_ms);
            true
        } else {
            false
        }
    }
}

/// Outcome of one tick: the action plus the hint to put on screen, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: CopilotAction,
    pub hint: Option<Hint>,
}

impl Decision {
    fn silent(action: CopilotAction) -> Self {
        Self { action, hint: None }
    }
}

/// Classify one sample and pick the adaptation action.
pub fn decide(
    sample: &NetworkSample,
    state: &mut HintState,
    now_ms: u64,
    cooldown_ms: u64,
) -> Decision {
    let loss = sample.packet_loss_percent;

    let mut decision = if loss > REDUCE_BITRATE_LOSS_PERCENT && loss <= AUDIO_ONLY_LOSS_PERCENT {
        Decision::silent(CopilotAction::ReduceBitrate { show_hint: false })
    } else if loss > AUDIO_ONLY_LOSS_PERCENT {
        let show_hint = state.try_claim(now_ms, cooldown_ms);
        Decision {
            action: CopilotAction::SwitchAudioOnly { show_hint },
            hint: show_hint.then(Hint::audio_optimized),
        }
    } else if sample.round_trip_time_ms > JITTER_BUFFER_RTT_MS {
        Decision::silent(CopilotAction::EnableJitterBuffer)
    } else if sample.is_disconnecting() {
        state.recovered_recently = false;
        let show_hint = state.try_claim(now_ms, cooldown_ms);
        Decision {
            action: CopilotAction::IceRestart { show_hint },
            hint: show_hint.then(Hint::reconnecting),
        }
    } else if sample.recovered && !state.recovered_recently {
        state.recovered_recently = true;
        let show_hint = state.try_claim(now_ms, cooldown_ms);
        stabilized(show_hint)
    } else {
        Decision::silent(CopilotAction::None)
    };

    let trend_recovered = state.previous_packet_loss > REDUCE_BITRATE_LOSS_PERCENT
        && loss < RECOVERY_LOSS_PERCENT
        && !state.recovered_recently;
    if trend_recovered && state.try_claim(now_ms, cooldown_ms) {
        state.recovered_recently = true;
        if decision.action.is_none() {
            decision = stabilized(true);
        } else {
            decision.hint = Some(Hint::call_stabilized());
        }
    }

    state.previous_packet_loss = loss;
    decision
}

fn stabilized(show_hint: bool) -> Decision {
    let hint = Hint::call_stabilized();
    Decision {
        action: CopilotAction::ShowHint {
            message: hint.message.clone(),
            duration_ms: hint.duration_ms,
            show_hint,
        },
        hint: show_hint.then_some(hint),
    }
}
