//! Synthetic media and statistics for offline tests
//!
//! Frames carry a moving gradient so consecutive frames differ; statistics
//! reports are shaped like a two-stream call over a single nominated pair.

use crate::encoder::{PixelFormat, VideoFrame};
use crate::transport::{CandidatePairStats, InboundRtpStats, StatsRecord, StatsReport};

/// Packets per synthetic report; loss is expressed against this total
pub const SYNTHETIC_PACKET_TOTAL: u64 = 1000;

/// RGB24 frame with a gradient that shifts every frame
pub fn synthetic_video_frame(frame_number: u64, width: u32, height: u32) -> VideoFrame {
    let mut data = vec![0u8; PixelFormat::Rgb8.frame_size(width, height)];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    // 30 fps capture clock
    let timestamp_us = frame_number * 33_333;
    VideoFrame::new(data, width, height, PixelFormat::Rgb8, timestamp_us)
}

/// Report whose inbound streams lose `loss_percent` of packets over an
/// active pair with `rtt_ms` round-trip time.
///
/// Loss resolution is 0.1 %.
pub fn synthetic_stats_report(loss_percent: f64, rtt_ms: f64) -> StatsReport {
    let loss_share = loss_percent.clamp(0.0, 100.0) / 100.0;
    let lost = (loss_share * SYNTHETIC_PACKET_TOTAL as f64).round() as u64;
    let received = SYNTHETIC_PACKET_TOTAL - lost;

    // Split across an audio and a video stream
    let audio_lost = lost / 2;
    let audio_received = received / 2;

    StatsReport::new(vec![
        StatsRecord::InboundRtp(InboundRtpStats {
            id: "inbound-audio".to_string(),
            packets_lost: audio_lost as i64,
            packets_received: audio_received,
            jitter: 0.004,
        }),
        StatsRecord::InboundRtp(InboundRtpStats {
            id: "inbound-video".to_string(),
            packets_lost: (lost - audio_lost) as i64,
            packets_received: received - audio_received,
            jitter: 0.006,
        }),
        StatsRecord::CandidatePair(CandidatePairStats {
            id: "pair-standby".to_string(),
            nominated: false,
            succeeded: true,
            current_round_trip_time: Some(2.0),
            available_outgoing_bitrate: None,
        }),
        StatsRecord::CandidatePair(CandidatePairStats {
            id: "pair-active".to_string(),
            nominated: true,
            succeeded: true,
            current_round_trip_time: Some(rtt_ms / 1000.0),
            available_outgoing_bitrate: Some(2_500_000.0),
        }),
        StatsRecord::Other {
            id: "transport".to_string(),
            kind: "transport".to_string(),
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::sample_from_report;
    use crate::types::TransportState;

    #[test]
    fn test_synthetic_video_frame_correct_size() {
        let frame = synthetic_video_frame(0, 320, 240);
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 240);
        assert!(frame.is_complete());
    }

    #[test]
    fn test_synthetic_video_frames_differ() {
        let frame0 = synthetic_video_frame(0, 32, 24);
        let frame1 = synthetic_video_frame(1, 32, 24);
        assert_ne!(frame0.data[0], frame1.data[0]);
        assert!(frame1.timestamp_us > frame0.timestamp_us);
    }

    #[test]
    fn test_synthetic_report_matches_requested_loss() {
        let report = synthetic_stats_report(15.0, 180.0);
        let sample = sample_from_report(&report, TransportState::Connected, None);
        assert!((sample.packet_loss_percent - 15.0).abs() < 1e-9);
        assert!((sample.round_trip_time_ms - 180.0).abs() < 1e-6);
        assert!((sample.jitter_ms - 10.0).abs() < 1e-9);
        assert_eq!(sample.available_outgoing_bitrate_bps, 2_500_000);
    }
}
