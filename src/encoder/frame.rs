//! Raw and encoded frames, plus the pull source and chunk sink contracts

use super::codec::VideoCodec;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit RGB
    Rgb8,
    /// Planar YUV 4:2:0
    I420,
}

impl PixelFormat {
    /// Bytes needed for a `width` x `height` picture
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            PixelFormat::Rgb8 => w * h * 3,
            PixelFormat::I420 => w * h + 2 * ((w / 2) * (h / 2)),
        }
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A captured frame.
///
/// Holds capture memory until closed; [`VideoFrame::close`] (or drop) runs
/// the release hook exactly once.
pub struct VideoFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Capture timestamp in microseconds
    pub timestamp_us: u64,
    release: Option<ReleaseHook>,
}

impl VideoFrame {
    pub fn new(
        data: impl Into<Bytes>,
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp_us: u64,
    ) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            format,
            timestamp_us,
            release: None,
        }
    }

    /// Run `hook` when the frame is released
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() == self.format.frame_size(self.width, self.height)
    }

    /// Release the frame's capture memory
    pub fn close(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(hook) = self.release.take() {
            hook();
        }
    }
}

impl Drop for VideoFrame {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("bytes", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("timestamp_us", &self.timestamp_us)
            .finish()
    }
}

/// Encoded output handed to the transport sender
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedChunk {
    pub data: Bytes,
    pub timestamp_us: u64,
    pub key_frame: bool,
    pub codec: VideoCodec,
}

/// Decoded picture
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub timestamp_us: u64,
}

/// Pull-style frame source over a live capture track
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, `None` once the track has ended
    async fn next_frame(&mut self) -> Option<VideoFrame>;
}

#[async_trait]
impl FrameSource for mpsc::Receiver<VideoFrame> {
    async fn next_frame(&mut self) -> Option<VideoFrame> {
        self.recv().await
    }
}

/// Transport-side consumer of encoded chunks
pub trait ChunkSink: Send + Sync {
    fn send_chunk(&self, chunk: EncodedChunk);
}

impl ChunkSink for mpsc::UnboundedSender<EncodedChunk> {
    fn send_chunk(&self, chunk: EncodedChunk) {
        if self.send(chunk).is_err() {
            log::warn!("Encoded chunk dropped - transport sender closed");
        }
    }
}
