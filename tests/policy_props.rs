//! Property-Based Tests for the adaptation policy
//!
//! These tests verify the decision list's precedence and hint-cooldown
//! contracts using proptest for input generation and shrinking.

use call_copilot::quality::policy::{decide, HintState, DEFAULT_HINT_COOLDOWN_MS};
use call_copilot::types::{CopilotAction, NetworkSample, TransportState};
use proptest::prelude::*;

const COOLDOWN: u64 = DEFAULT_HINT_COOLDOWN_MS;

fn lossy(percent: f64) -> NetworkSample {
    NetworkSample::connected().with_packet_loss(percent)
}

fn any_state() -> impl Strategy<Value = TransportState> {
    prop_oneof![
        Just(TransportState::Connecting),
        Just(TransportState::Connected),
        Just(TransportState::Completed),
        Just(TransportState::Disconnected),
        Just(TransportState::Failed),
        Just(TransportState::Closed),
    ]
}

fn any_hint_state() -> impl Strategy<Value = (HintState, u64)> {
    (
        proptest::option::of(0u64..100_000),
        any::<bool>(),
        0.0f64..100.0,
        0u64..200_000,
    )
        .prop_map(|(last, recovered_recently, previous, now_offset)| {
            let state = HintState {
                last_hint_at_ms: last,
                recovered_recently,
                previous_packet_loss: previous,
            };
            (state, last.unwrap_or(0) + now_offset)
        })
}

proptest! {
    /// INVARIANT: moderate loss is always a silent bitrate reduction
    #[test]
    fn moderate_loss_reduces_bitrate_silently(
        loss in (10.0f64..=25.0).prop_filter("above 10", |l| *l > 10.0),
        rtt in 0.0f64..2_000.0,
        state in any_state(),
        recovered in any::<bool>(),
        (mut hints, now) in any_hint_state(),
    ) {
        let sample = NetworkSample::connected()
            .with_packet_loss(loss)
            .with_round_trip_time(rtt)
            .with_state(state)
            .with_recovered(recovered);

        let decision = decide(&sample, &mut hints, now, COOLDOWN);
        prop_assert_eq!(decision.action, CopilotAction::ReduceBitrate { show_hint: false });
        prop_assert!(decision.hint.is_none());
    }

    /// INVARIANT: severe loss drops video; visible iff the cooldown elapsed
    #[test]
    fn severe_loss_switches_to_audio(
        loss in (25.0f64..=100.0).prop_filter("above 25", |l| *l > 25.0),
        state in any_state(),
        (mut hints, now) in any_hint_state(),
    ) {
        let elapsed = hints.cooldown_elapsed(now, COOLDOWN);
        let sample = NetworkSample::connected().with_packet_loss(loss).with_state(state);

        let decision = decide(&sample, &mut hints, now, COOLDOWN);
        prop_assert_eq!(decision.action, CopilotAction::SwitchAudioOnly { show_hint: elapsed });
        prop_assert_eq!(decision.hint.is_some(), elapsed);
        if elapsed {
            prop_assert_eq!(hints.last_hint_at_ms, Some(now));
        }
    }

    /// INVARIANT: high RTT with tolerable loss enables the jitter buffer
    /// with no hint, whatever the cooldown
    #[test]
    fn high_rtt_enables_jitter_buffer(
        loss in 0.0f64..=10.0,
        rtt in (500.0f64..5_000.0).prop_filter("above 500", |r| *r > 500.0),
        state in any_state(),
        mut hints in any_hint_state().prop_map(|(mut h, _)| { h.previous_packet_loss = 0.0; h }),
    ) {
        let sample = NetworkSample::connected()
            .with_packet_loss(loss)
            .with_round_trip_time(rtt)
            .with_state(state);

        let decision = decide(&sample, &mut hints, 1_000_000, COOLDOWN);
        prop_assert_eq!(decision.action, CopilotAction::EnableJitterBuffer);
        prop_assert!(decision.hint.is_none());
    }

    /// INVARIANT: at most one visible hint per cooldown window
    #[test]
    fn visible_hints_respect_cooldown(
        samples in proptest::collection::vec(
            (0.0f64..60.0, 0.0f64..800.0, any_state(), any::<bool>(), 0u64..20_000),
            1..40,
        ),
    ) {
        let mut hints = HintState::new();
        let mut now = 0u64;
        let mut last_visible: Option<u64> = None;

        for (loss, rtt, state, recovered, step) in samples {
            now += step;
            let sample = NetworkSample::connected()
                .with_packet_loss(loss)
                .with_round_trip_time(rtt)
                .with_state(state)
                .with_recovered(recovered);

            let decision = decide(&sample, &mut hints, now, COOLDOWN);
            if decision.hint.is_some() {
                if let Some(previous) = last_visible {
                    prop_assert!(now - previous >= COOLDOWN);
                }
                last_visible = Some(now);
            }
            prop_assert_eq!(hints.previous_packet_loss, loss);
        }
    }

    /// INVARIANT: a reset state always allows the next hint
    #[test]
    fn reset_clears_cooldown(
        last in 0u64..1_000_000,
        gap in 0u64..COOLDOWN,
    ) {
        let mut hints = HintState {
            last_hint_at_ms: Some(last),
            recovered_recently: true,
            previous_packet_loss: 40.0,
        };
        let sample = NetworkSample::connected().with_packet_loss(30.0);
        let now = last + gap;

        let suppressed = decide(&sample, &mut hints.clone(), now, COOLDOWN);
        prop_assert_eq!(suppressed.action, CopilotAction::SwitchAudioOnly { show_hint: false });

        hints.reset();
        let shown = decide(&sample, &mut hints, now, COOLDOWN);
        prop_assert_eq!(shown.action, CopilotAction::SwitchAudioOnly { show_hint: true });
    }
}

#[test]
fn recovery_trend_outside_cooldown_shows_stabilized() {
    let mut hints = HintState {
        last_hint_at_ms: Some(0),
        ..HintState::default()
    };

    let first = decide(&lossy(15.0), &mut hints, 20_000, COOLDOWN);
    assert_eq!(first.action, CopilotAction::ReduceBitrate { show_hint: false });

    let second = decide(&lossy(1.0), &mut hints, 23_000, COOLDOWN);
    match second.action {
        CopilotAction::ShowHint { message, show_hint, .. } => {
            assert_eq!(message, "Call stabilized");
            assert!(show_hint);
        }
        other => panic!("expected show-hint, got {:?}", other),
    }
    assert!(hints.recovered_recently);
}

#[test]
fn recovery_trend_inside_cooldown_is_none() {
    let mut hints = HintState {
        last_hint_at_ms: Some(10_000),
        ..HintState::default()
    };

    decide(&lossy(15.0), &mut hints, 12_000, COOLDOWN);
    let second = decide(&lossy(1.0), &mut hints, 15_000, COOLDOWN);

    assert_eq!(second.action, CopilotAction::None);
    assert!(second.hint.is_none());
    assert!(!hints.recovered_recently);
}

#[test]
fn recovery_trend_inside_cooldown_with_state_recovery() {
    let mut hints = HintState {
        last_hint_at_ms: Some(10_000),
        ..HintState::default()
    };

    decide(&NetworkSample::connected().with_packet_loss(15.0), &mut hints, 12_000, COOLDOWN);
    let recovered = NetworkSample::connected()
        .with_packet_loss(1.0)
        .with_recovered(true);
    let second = decide(&recovered, &mut hints, 15_000, COOLDOWN);

    assert!(matches!(
        second.action,
        CopilotAction::ShowHint { show_hint: false, .. }
    ));
    assert!(second.hint.is_none());
}
