//! Pre-call route selection scenarios

use call_copilot::config::MonitorConfig;
use call_copilot::quality::{assess_network, CallCopilot, TcpLatencyProbe};
use call_copilot::testing::StaticProbe;
use call_copilot::types::{
    CallRoute, Capability, ConnectionHints, EffectiveConnectionType, QualityClassification,
};
use std::time::Duration;
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(3);

#[tokio::test]
async fn test_excellent_network_gets_hd_video() {
    let assessment = assess_network(&StaticProbe::new(30, 15.0), TIMEOUT).await;
    assert_eq!(assessment.classification, QualityClassification::Excellent);
    assert_eq!(assessment.route, CallRoute::HdVideo);
    assert!((assessment.latency_ms.unwrap() - 30.0).abs() < 1e-6);
    assert_eq!(assessment.downlink_mbps, Some(15.0));
}

#[tokio::test]
async fn test_fair_network_gets_audio_only() {
    let assessment = assess_network(&StaticProbe::new(200, 3.0), TIMEOUT).await;
    assert_eq!(assessment.classification, QualityClassification::Fair);
    assert_eq!(assessment.route, CallRoute::AudioOnly);
}

#[tokio::test]
async fn test_offline_gets_low_bitrate_audio() {
    let assessment = assess_network(&StaticProbe::offline(), TIMEOUT).await;
    assert_eq!(assessment.classification, QualityClassification::Offline);
    assert_eq!(assessment.route, CallRoute::LowBitrateAudio);
    assert!(assessment.latency_ms.is_none());
}

#[tokio::test]
async fn test_connection_type_caps_classification() {
    let three_g = StaticProbe::new(30, 15.0).with_effective_type(EffectiveConnectionType::ThreeG);
    let assessment = assess_network(&three_g, TIMEOUT).await;
    assert_eq!(assessment.classification, QualityClassification::Fair);
    assert_eq!(assessment.route, CallRoute::AudioOnly);

    let two_g = StaticProbe::new(30, 15.0).with_effective_type(EffectiveConnectionType::TwoG);
    let assessment = assess_network(&two_g, TIMEOUT).await;
    assert_eq!(assessment.classification, QualityClassification::Poor);
    assert_eq!(assessment.route, CallRoute::LowBitrateAudio);
}

#[tokio::test]
async fn test_probe_failure_is_neutral() {
    let assessment = assess_network(&StaticProbe::failing(), TIMEOUT).await;
    assert_eq!(assessment.classification, QualityClassification::Unknown);
    assert_eq!(assessment.route, CallRoute::StandardVideo);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_probe_is_bounded_by_timeout() {
    let started = tokio::time::Instant::now();
    let assessment = assess_network(&StaticProbe::hanging(), TIMEOUT).await;

    assert_eq!(assessment.classification, QualityClassification::Unknown);
    assert_eq!(assessment.route, CallRoute::StandardVideo);
    assert!(started.elapsed() >= TIMEOUT);
    assert!(started.elapsed() < TIMEOUT + Duration::from_secs(1));
}

#[tokio::test]
async fn test_engine_records_assessment() {
    let copilot = CallCopilot::new(&MonitorConfig::default());
    copilot
        .analyze_network_quality(&StaticProbe::new(100, 8.0), TIMEOUT)
        .await;

    assert_eq!(copilot.network_quality(), QualityClassification::Good);
    assert_eq!(copilot.recommended_route(), CallRoute::StandardVideo);
    assert!(copilot.assessment().is_some());

    copilot.reset();
    assert_eq!(copilot.network_quality(), QualityClassification::Unknown);
}

#[tokio::test]
async fn test_tcp_probe_against_local_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept = tokio::spawn(async move {
        let _ = listener.accept().await;
    });

    let probe = TcpLatencyProbe::new(addr.to_string()).with_hints(ConnectionHints {
        online: Capability::Supported(true),
        effective_type: Capability::Unsupported,
        downlink_mbps: Capability::Unsupported,
    });
    let assessment = assess_network(&probe, TIMEOUT).await;

    assert!(assessment.latency_ms.is_some());
    assert!(assessment.downlink_mbps.is_none());
    assert_ne!(assessment.classification, QualityClassification::Unknown);
    accept.await.unwrap();
}

#[tokio::test]
async fn test_tcp_probe_refused_connection() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let assessment = assess_network(&TcpLatencyProbe::new(addr.to_string()), TIMEOUT).await;
    assert_eq!(assessment.classification, QualityClassification::Unknown);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_hints_are_bounded_by_timeout() {
    let started = tokio::time::Instant::now();
    let probe = StaticProbe::new(30, 15.0).with_hanging_hints();
    let assessment = assess_network(&probe, TIMEOUT).await;

    assert!(started.elapsed() >= TIMEOUT);
    assert!(started.elapsed() < TIMEOUT + Duration::from_secs(1));
    assert!(assessment.downlink_mbps.is_none(), "hints treated as unavailable");
}

#[tokio::test(start_paused = true)]
async fn test_hints_and_latency_share_one_deadline() {
    let started = tokio::time::Instant::now();
    let probe = StaticProbe::hanging().with_hanging_hints();
    let assessment = assess_network(&probe, TIMEOUT).await;

    assert_eq!(assessment.classification, QualityClassification::Unknown);
    assert_eq!(assessment.route, CallRoute::StandardVideo);
    assert!(started.elapsed() < TIMEOUT + Duration::from_secs(1));
}
