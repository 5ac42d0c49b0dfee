//! Hardware Encoder Manager
//!
//! Picks the best codec path for an outgoing video track, configures the
//! encoder from a preset and runs the frame pull loop that feeds encoded
//! chunks to the transport sender.

use super::codec::{
    select_codec, CodecChoice, CodecState, EncoderBackend, EncoderConfig, HardwareAcceleration,
    VideoCodec,
};
use super::frame::{ChunkSink, FrameSource};
use super::presets::QualityPreset;
use crate::config::EncoderSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Periodic encoder report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderStats {
    pub encoded_frame_count: u64,
    pub dropped_frame_count: u64,
    pub average_encode_time_ms: f64,
    pub codec: VideoCodec,
    pub hardware_accelerated: bool,
    pub target_bitrate: u32,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct FrameCounters {
    encoded: u64,
    dropped: u64,
    encode_time: Duration,
}

impl FrameCounters {
    fn average_encode_time_ms(&self) -> f64 {
        if self.encoded == 0 {
            return 0.0;
        }
        self.encode_time.as_secs_f64() * 1000.0 / self.encoded as f64
    }
}

type SharedBackend = Arc<Mutex<Box<dyn EncoderBackend>>>;

/// State shared between the manager and its pull loop
struct PullLoop {
    backend: SharedBackend,
    sink: Arc<dyn ChunkSink>,
    stop_flag: Arc<AtomicBool>,
    target_bitrate: Arc<AtomicU32>,
    /// Bitrate the backend is currently running at
    applied_bitrate: Arc<AtomicU32>,
    counters: Arc<Mutex<FrameCounters>>,
    stats_sender: broadcast::Sender<EncoderStats>,
    choice: CodecChoice,
    key_frame_interval: u64,
    stats_interval: u64,
}

impl PullLoop {
    async fn run(self, mut source: Box<dyn FrameSource>) {
        let mut frame_index: u64 = 0;

        log::info!(
            "Encode loop started ({}, hardware: {})",
            self.choice.codec,
            self.choice.hardware_accelerated
        );

        while !self.stop_flag.load(Ordering::SeqCst) {
            let Some(frame) = source.next_frame().await else {
                log::info!("Video source ended after {} frames", frame_index);
                break;
            };

            if self.stop_flag.load(Ordering::SeqCst) {
                frame.close();
                break;
            }

            let key_frame = frame_index % self.key_frame_interval == 0;
            frame_index += 1;

            let started = Instant::now();
            let result = {
                let mut backend = crate::lock(&self.backend);

                let target = self.target_bitrate.load(Ordering::SeqCst);
                if target != self.applied_bitrate.load(Ordering::SeqCst) {
                    match backend.set_bitrate(target) {
                        Ok(()) => {
                            log::debug!("Applied bitrate {} bps", target);
                            self.applied_bitrate.store(target, Ordering::SeqCst);
                        }
                        Err(e) => log::warn!("Failed to apply bitrate {}: {}", target, e),
                    }
                }

                backend.encode(&frame, key_frame)
            };
            let elapsed = started.elapsed();

            // Release capture memory whether or not the encode succeeded.
            frame.close();

            match result {
                Ok(chunk) => {
                    let encoded = {
                        let mut counters = crate::lock(&self.counters);
                        counters.encoded += 1;
                        counters.encode_time += elapsed;
                        counters.encoded
                    };
                    self.sink.send_chunk(chunk);

                    if encoded % self.stats_interval == 0 {
                        self.report();
                    }
                }
                Err(e) => {
                    log::warn!("Dropped frame {}: {}", frame_index - 1, e);
                    crate::lock(&self.counters).dropped += 1;
                }
            }
        }

        log::info!("Encode loop ended");
    }

    fn report(&self) {
        let stats = snapshot(
            &self.counters,
            self.choice,
            self.target_bitrate.load(Ordering::SeqCst),
        );
        log::debug!(
            "Encoder stats: encoded={} dropped={} avg={:.2}ms",
            stats.encoded_frame_count,
            stats.dropped_frame_count,
            stats.average_encode_time_ms
        );
        let _ = self.stats_sender.send(stats);
    }
}

fn snapshot(
    counters: &Mutex<FrameCounters>,
    choice: CodecChoice,
    target_bitrate: u32,
) -> EncoderStats {
    let counters = crate::lock(counters);
    EncoderStats {
        encoded_frame_count: counters.encoded,
        dropped_frame_count: counters.dropped,
        average_encode_time_ms: counters.average_encode_time_ms(),
        codec: choice.codec,
        hardware_accelerated: choice.hardware_accelerated,
        target_bitrate,
        reported_at: Utc::now(),
    }
}

/// Outgoing video encoder for one call
pub struct HardwareEncoderManager {
    settings: EncoderSettings,
    backend: SharedBackend,
    sink: Arc<dyn ChunkSink>,
    source: Mutex<Option<Box<dyn FrameSource>>>,
    config: Mutex<Option<EncoderConfig>>,
    choice: Mutex<Option<CodecChoice>>,
    target_bitrate: Arc<AtomicU32>,
    applied_bitrate: Arc<AtomicU32>,
    stop_flag: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Mutex<FrameCounters>>,
    stats_sender: broadcast::Sender<EncoderStats>,
}

impl HardwareEncoderManager {
    pub fn new(
        settings: EncoderSettings,
        backend: Box<dyn EncoderBackend>,
        sink: Arc<dyn ChunkSink>,
    ) -> Self {
        let (stats_sender, _) = broadcast::channel(16);

        Self {
            settings,
            backend: Arc::new(Mutex::new(backend)),
            sink,
            source: Mutex::new(None),
            config: Mutex::new(None),
            choice: Mutex::new(None),
            target_bitrate: Arc::new(AtomicU32::new(0)),
            applied_bitrate: Arc::new(AtomicU32::new(0)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            counters: Arc::new(Mutex::new(FrameCounters::default())),
            stats_sender,
        }
    }

    /// Choose a codec and configure the encoder for `source`.
    ///
    /// `preset_name` falls back to the configured default preset, then to
    /// `adaptive`. Returns `false` when the backend rejects every option;
    /// the caller should use the platform's default encode path instead.
    pub fn initialize(&self, source: Box<dyn FrameSource>, preset_name: Option<&str>) -> bool {
        if crate::lock(&self.config).is_some() {
            log::warn!("Encoder already initialized");
            return false;
        }

        let name = preset_name.unwrap_or(&self.settings.default_preset);
        let preset = QualityPreset::by_name(name).unwrap_or_else(|| {
            log::warn!("Unknown preset '{}', using adaptive", name);
            QualityPreset::adaptive()
        });

        let mut backend = crate::lock(&self.backend);
        if backend.state() == CodecState::Closed {
            log::warn!("Encoder backend {} is closed", backend.name());
            return false;
        }

        let base = EncoderConfig::from_preset(&preset, VideoCodec::H264High);
        let choice = select_codec(&**backend, &base, self.settings.prefer_hardware);
        let acceleration = if choice.hardware_accelerated {
            HardwareAcceleration::PreferHardware
        } else {
            HardwareAcceleration::PreferSoftware
        };
        let config = base.with_codec(choice.codec).with_acceleration(acceleration);

        if let Err(e) = backend.configure(&config) {
            log::error!(
                "Encoder {} rejected {} at {}x{}: {}",
                backend.name(),
                config.codec,
                config.width,
                config.height,
                e
            );
            return false;
        }

        log::info!(
            "Encoder {} configured: {} {}x{}@{} {} bps ({})",
            backend.name(),
            config.codec,
            config.width,
            config.height,
            config.frame_rate,
            config.bitrate,
            if choice.hardware_accelerated {
                "hardware"
            } else {
                "software"
            }
        );
        drop(backend);

        self.target_bitrate.store(config.bitrate, Ordering::SeqCst);
        self.applied_bitrate.store(config.bitrate, Ordering::SeqCst);
        *crate::lock(&self.counters) = FrameCounters::default();
        *crate::lock(&self.choice) = Some(choice);
        *crate::lock(&self.config) = Some(config);
        *crate::lock(&self.source) = Some(source);
        true
    }

    /// Start the pull loop. Requires a prior successful `initialize` and a
    /// tokio runtime.
    pub fn start(&self) -> bool {
        if self.is_running() {
            log::debug!("Encode loop already running");
            return true;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            log::warn!("Cannot start encode loop outside a tokio runtime");
            return false;
        }

        let (Some(config), Some(choice)) =
            (crate::lock(&self.config).clone(), *crate::lock(&self.choice))
        else {
            log::warn!("Encoder not initialized");
            return false;
        };
        let Some(source) = crate::lock(&self.source).take() else {
            log::warn!("No video source to pull from");
            return false;
        };

        self.stop_flag.store(false, Ordering::SeqCst);
        let pull_loop = PullLoop {
            backend: Arc::clone(&self.backend),
            sink: Arc::clone(&self.sink),
            stop_flag: Arc::clone(&self.stop_flag),
            target_bitrate: Arc::clone(&self.target_bitrate),
            applied_bitrate: Arc::clone(&self.applied_bitrate),
            counters: Arc::clone(&self.counters),
            stats_sender: self.stats_sender.clone(),
            choice,
            key_frame_interval: u64::from(config.key_frame_interval_frames.max(1)),
            stats_interval: self.settings.stats_interval_frames.max(1),
        };

        *crate::lock(&self.task) = Some(tokio::spawn(pull_loop.run(source)));
        true
    }

    /// Request a new target bitrate. Ignored unless the encoder is
    /// configured; the pull loop applies it before the next encode.
    pub fn update_bitrate(&self, bitrate: u32) -> bool {
        if crate::lock(&self.backend).state() != CodecState::Configured {
            log::debug!("Bitrate update to {} ignored, encoder not configured", bitrate);
            return false;
        }

        self.target_bitrate.store(bitrate, Ordering::SeqCst);
        if let Some(config) = crate::lock(&self.config).as_mut() {
            config.bitrate = bitrate;
        }
        log::info!("Target bitrate set to {} bps", bitrate);
        true
    }

    /// Cancel the pull loop, flush and close the encoder.
    ///
    /// Safe to call repeatedly and after a failed `initialize`.
    pub async fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);

        let task = crate::lock(&self.task).take();
        if let Some(task) = task {
            task.abort();
            // Cancellation surfaces as a JoinError.
            let _ = task.await;
        }

        crate::lock(&self.source).take();

        let flushed = {
            let mut backend = crate::lock(&self.backend);
            let mut flushed = Vec::new();
            if backend.state() == CodecState::Configured {
                match backend.flush() {
                    Ok(chunks) => flushed = chunks,
                    Err(e) => log::warn!("Encoder flush failed: {}", e),
                }
            }
            if backend.state() != CodecState::Closed {
                backend.close();
                log::info!("Encoder {} closed", backend.name());
            }
            flushed
        };

        for chunk in flushed {
            self.sink.send_chunk(chunk);
        }

        crate::lock(&self.config).take();
    }

    pub fn is_running(&self) -> bool {
        crate::lock(&self.task)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Current counters; `None` before initialization
    pub fn stats(&self) -> Option<EncoderStats> {
        let choice = (*crate::lock(&self.choice))?;
        Some(snapshot(
            &self.counters,
            choice,
            self.target_bitrate.load(Ordering::SeqCst),
        ))
    }

    pub fn subscribe_stats(&self) -> broadcast::Receiver<EncoderStats> {
        self.stats_sender.subscribe()
    }

    pub fn target_bitrate(&self) -> u32 {
        self.target_bitrate.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> Option<EncoderConfig> {
        crate::lock(&self.config).clone()
    }

    pub fn codec_choice(&self) -> Option<CodecChoice> {
        *crate::lock(&self.choice)
    }
}

impl Drop for HardwareEncoderManager {
    fn drop(&mut self) {
        if let Some(task) = crate::lock(&self.task).take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CollectingSink, ScriptedEncoderBackend, SyntheticFrameSource};

    fn manager(backend: ScriptedEncoderBackend) -> (HardwareEncoderManager, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        let manager = HardwareEncoderManager::new(
            EncoderSettings::default(),
            Box::new(backend),
            sink.clone(),
        );
        (manager, sink)
    }

    #[test]
    fn test_initialize_uses_hardware_codec() {
        let (manager, _) =
            manager(ScriptedEncoderBackend::new().with_hardware(&[VideoCodec::H264Main]));
        assert!(manager.initialize(Box::new(SyntheticFrameSource::new(1)), Some("720p30")));

        let config = manager.config().unwrap();
        assert_eq!(config.codec, VideoCodec::H264Main);
        assert_eq!((config.width, config.height), (1280, 720));
        assert!(manager.codec_choice().unwrap().hardware_accelerated);
        assert_eq!(manager.target_bitrate(), 2_500_000);
    }

    #[test]
    fn test_unknown_preset_falls_back_to_adaptive() {
        let (manager, _) = manager(ScriptedEncoderBackend::new());
        assert!(manager.initialize(Box::new(SyntheticFrameSource::new(1)), Some("8k240")));
        assert_eq!(manager.target_bitrate(), 2_000_000);
    }

    #[test]
    fn test_rejected_configuration() {
        let (manager, _) = manager(ScriptedEncoderBackend::new().failing_configure());
        assert!(!manager.initialize(Box::new(SyntheticFrameSource::new(1)), None));
        assert!(manager.config().is_none());
        assert!(manager.stats().is_none());
        assert!(!manager.update_bitrate(500_000));
    }

    #[test]
    fn test_initialize_twice() {
        let (manager, _) = manager(ScriptedEncoderBackend::new());
        assert!(manager.initialize(Box::new(SyntheticFrameSource::new(1)), None));
        assert!(!manager.initialize(Box::new(SyntheticFrameSource::new(1)), None));
    }

    #[test]
    fn test_start_without_initialize() {
        let (manager, _) = manager(ScriptedEncoderBackend::new());
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            assert!(!manager.start());
            assert!(!manager.is_running());
        });
    }

    #[tokio::test]
    async fn test_stop_after_failed_initialize() {
        let (manager, _) = manager(ScriptedEncoderBackend::new().failing_configure());
        assert!(!manager.initialize(Box::new(SyntheticFrameSource::new(1)), None));
        manager.stop().await;
        manager.stop().await;
        assert!(!manager.is_running());
    }
}
