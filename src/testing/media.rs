//! Scripted codec backends, frame source and chunk sink

use super::synthetic_data::synthetic_video_frame;
use crate::encoder::{
    ChunkSink, CodecState, CodecSupport, DecodedFrame, DecoderBackend, DecoderConfig,
    EncodedChunk, EncoderBackend, EncoderConfig, FrameSource, HardwareAcceleration, PixelFormat,
    VideoCodec, VideoFrame,
};
use crate::errors::{CopilotError, CopilotResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Calls observed by a [`ScriptedEncoderBackend`]
#[derive(Debug, Clone, Default)]
pub struct EncoderLog {
    pub configured: Vec<EncoderConfig>,
    pub encode_calls: u64,
    /// Encode call indices that requested a key frame
    pub key_frame_requests: Vec<u64>,
    pub bitrates: Vec<u32>,
    pub flushes: usize,
    pub closes: usize,
}

/// Shared view of an encoder backend's call log
#[derive(Debug, Clone, Default)]
pub struct EncoderLogHandle(Arc<Mutex<EncoderLog>>);

impl EncoderLogHandle {
    pub fn snapshot(&self) -> EncoderLog {
        crate::lock(&self.0).clone()
    }
}

/// Encoder backend with configurable capabilities and failures
pub struct ScriptedEncoderBackend {
    hardware: Vec<VideoCodec>,
    fail_configure: bool,
    fail_on: HashSet<u64>,
    pending_on_flush: usize,
    state: CodecState,
    codec: Option<VideoCodec>,
    log: EncoderLogHandle,
}

impl ScriptedEncoderBackend {
    /// Software support for every codec, no hardware paths
    pub fn new() -> Self {
        Self {
            hardware: Vec::new(),
            fail_configure: false,
            fail_on: HashSet::new(),
            pending_on_flush: 0,
            state: CodecState::Unconfigured,
            codec: None,
            log: EncoderLogHandle::default(),
        }
    }

    pub fn with_hardware(mut self, codecs: &[VideoCodec]) -> Self {
        self.hardware = codecs.to_vec();
        self
    }

    pub fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    /// Fail the encode calls at these indices (0-based)
    pub fn failing_on(mut self, calls: &[u64]) -> Self {
        self.fail_on = calls.iter().copied().collect();
        self
    }

    /// Hold back `count` chunks until flushed
    pub fn with_pending_on_flush(mut self, count: usize) -> Self {
        self.pending_on_flush = count;
        self
    }

    pub fn log(&self) -> EncoderLogHandle {
        self.log.clone()
    }
}

impl Default for ScriptedEncoderBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderBackend for ScriptedEncoderBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn probe(&self, config: &EncoderConfig) -> CodecSupport {
        let wants_hardware = config.hardware_acceleration == HardwareAcceleration::PreferHardware;
        if wants_hardware && self.hardware.contains(&config.codec) {
            CodecSupport::Hardware
        } else {
            CodecSupport::Software
        }
    }

    fn configure(&mut self, config: &EncoderConfig) -> CopilotResult<()> {
        if self.fail_configure {
            return Err(CopilotError::Encoder("configuration rejected".to_string()));
        }
        if self.state == CodecState::Closed {
            return Err(CopilotError::Encoder("encoder is closed".to_string()));
        }

        crate::lock(&self.log.0).configured.push(config.clone());
        self.codec = Some(config.codec);
        self.state = CodecState::Configured;
        Ok(())
    }

    fn encode(&mut self, frame: &VideoFrame, key_frame: bool) -> CopilotResult<EncodedChunk> {
        let (CodecState::Configured, Some(codec)) = (self.state, self.codec) else {
            return Err(CopilotError::NotInitialized("scripted encoder".to_string()));
        };

        let index = {
            let mut log = crate::lock(&self.log.0);
            let index = log.encode_calls;
            log.encode_calls += 1;
            if key_frame {
                log.key_frame_requests.push(index);
            }
            index
        };

        if self.fail_on.contains(&index) {
            return Err(CopilotError::Encoder(format!("transient failure on call {}", index)));
        }

        Ok(EncodedChunk {
            data: Bytes::copy_from_slice(&index.to_be_bytes()),
            timestamp_us: frame.timestamp_us,
            key_frame,
            codec,
        })
    }

    fn set_bitrate(&mut self, bitrate: u32) -> CopilotResult<()> {
        if self.state != CodecState::Configured {
            return Err(CopilotError::NotInitialized("scripted encoder".to_string()));
        }
        crate::lock(&self.log.0).bitrates.push(bitrate);
        Ok(())
    }

    fn flush(&mut self) -> CopilotResult<Vec<EncodedChunk>> {
        crate::lock(&self.log.0).flushes += 1;
        let codec = self.codec.unwrap_or(VideoCodec::H264High);
        let pending = std::mem::take(&mut self.pending_on_flush);

        Ok((0..pending)
            .map(|i| EncodedChunk {
                data: Bytes::from_static(b"flushed"),
                timestamp_us: i as u64,
                key_frame: false,
                codec,
            })
            .collect())
    }

    fn close(&mut self) {
        crate::lock(&self.log.0).closes += 1;
        self.state = CodecState::Closed;
    }

    fn state(&self) -> CodecState {
        self.state
    }
}

/// Decoder backend echoing chunk payloads as 2x2 pictures
pub struct ScriptedDecoderBackend {
    hardware: Vec<VideoCodec>,
    fail_on: HashSet<u64>,
    decode_calls: u64,
    buffered: Vec<DecodedFrame>,
    state: CodecState,
}

impl ScriptedDecoderBackend {
    pub fn new() -> Self {
        Self {
            hardware: Vec::new(),
            fail_on: HashSet::new(),
            decode_calls: 0,
            buffered: Vec::new(),
            state: CodecState::Unconfigured,
        }
    }

    pub fn with_hardware(mut self, codecs: &[VideoCodec]) -> Self {
        self.hardware = codecs.to_vec();
        self
    }

    pub fn failing_on(mut self, calls: &[u64]) -> Self {
        self.fail_on = calls.iter().copied().collect();
        self
    }

    /// Keep one picture buffered until flush
    pub fn with_buffered_frame(mut self) -> Self {
        self.buffered.push(DecodedFrame {
            data: Bytes::from_static(b"buffered"),
            width: 2,
            height: 2,
            format: PixelFormat::I420,
            timestamp_us: 0,
        });
        self
    }
}

impl Default for ScriptedDecoderBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderBackend for ScriptedDecoderBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn probe(&self, config: &DecoderConfig) -> CodecSupport {
        match config.hardware_acceleration {
            HardwareAcceleration::PreferHardware if self.hardware.contains(&config.codec) => {
                CodecSupport::Hardware
            }
            HardwareAcceleration::PreferHardware => CodecSupport::Unsupported,
            _ => CodecSupport::Software,
        }
    }

    fn configure(&mut self, _config: &DecoderConfig) -> CopilotResult<()> {
        if self.state != CodecState::Unconfigured {
            return Err(CopilotError::Decoder("already configured".to_string()));
        }
        self.state = CodecState::Configured;
        Ok(())
    }

    fn decode(&mut self, chunk: &EncodedChunk) -> CopilotResult<Option<DecodedFrame>> {
        let index = self.decode_calls;
        self.decode_calls += 1;

        if self.fail_on.contains(&index) {
            return Err(CopilotError::Decoder(format!("corrupt chunk {}", index)));
        }

        Ok(Some(DecodedFrame {
            data: chunk.data.clone(),
            width: 2,
            height: 2,
            format: PixelFormat::I420,
            timestamp_us: chunk.timestamp_us,
        }))
    }

    fn flush(&mut self) -> CopilotResult<Vec<DecodedFrame>> {
        Ok(std::mem::take(&mut self.buffered))
    }

    fn close(&mut self) {
        self.state = CodecState::Closed;
    }

    fn state(&self) -> CodecState {
        self.state
    }
}

/// Counts frames handed out and frames still unreleased
#[derive(Debug, Clone, Default)]
pub struct FrameTracker {
    produced: Arc<AtomicU64>,
    outstanding: Arc<AtomicUsize>,
}

impl FrameTracker {
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::SeqCst)
    }

    /// Frames handed out and not yet closed
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// Pull source producing synthetic RGB frames
pub struct SyntheticFrameSource {
    remaining: u64,
    width: u32,
    height: u32,
    frame_interval: Option<Duration>,
    hold_open: bool,
    tracker: FrameTracker,
}

impl SyntheticFrameSource {
    /// `count` 16x16 frames, available immediately, then end of track
    pub fn new(count: u64) -> Self {
        Self {
            remaining: count,
            width: 16,
            height: 16,
            frame_interval: None,
            hold_open: false,
            tracker: FrameTracker::default(),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Wait `interval` before each frame, like a live capture cadence
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Block forever instead of ending once `count` frames are out
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn tracker(&self) -> FrameTracker {
        self.tracker.clone()
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn next_frame(&mut self) -> Option<VideoFrame> {
        if self.remaining == 0 {
            if self.hold_open {
                std::future::pending::<()>().await;
            }
            return None;
        }

        if let Some(interval) = self.frame_interval {
            tokio::time::sleep(interval).await;
        }
        self.remaining -= 1;

        let frame_number = self.tracker.produced.fetch_add(1, Ordering::SeqCst);
        self.tracker.outstanding.fetch_add(1, Ordering::SeqCst);
        let outstanding = Arc::clone(&self.tracker.outstanding);

        Some(
            synthetic_video_frame(frame_number, self.width, self.height).with_release_hook(
                move || {
                    outstanding.fetch_sub(1, Ordering::SeqCst);
                },
            ),
        )
    }
}

/// Chunk sink that keeps everything it receives
#[derive(Debug, Default)]
pub struct CollectingSink {
    chunks: Mutex<Vec<EncodedChunk>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> Vec<EncodedChunk> {
        crate::lock(&self.chunks).clone()
    }

    pub fn len(&self) -> usize {
        crate::lock(&self.chunks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChunkSink for CollectingSink {
    fn send_chunk(&self, chunk: EncodedChunk) {
        crate::lock(&self.chunks).push(chunk);
    }
}
