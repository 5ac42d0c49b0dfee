//! Decoder counterpart of the encoder manager

use super::codec::{
    CodecState, CodecSupport, DecoderBackend, DecoderConfig, HardwareAcceleration, VideoCodec,
};
use super::frame::{DecodedFrame, EncodedChunk};

/// Incoming video decoder for one call
pub struct HardwareDecoder {
    backend: Box<dyn DecoderBackend>,
    config: Option<DecoderConfig>,
    decoded_count: u64,
    error_count: u64,
}

impl HardwareDecoder {
    pub fn new(backend: Box<dyn DecoderBackend>) -> Self {
        Self {
            backend,
            config: None,
            decoded_count: 0,
            error_count: 0,
        }
    }

    /// Configure for `codec`, trying hardware first when `prefer_hardware`.
    ///
    /// A decoder is configured at most once.
    pub fn configure(&mut self, codec: VideoCodec, prefer_hardware: bool) -> bool {
        if self.backend.state() != CodecState::Unconfigured {
            log::warn!(
                "Decoder {} cannot be configured from {:?}",
                self.backend.name(),
                self.backend.state()
            );
            return false;
        }

        let mut candidates = Vec::with_capacity(2);
        if prefer_hardware {
            candidates.push(HardwareAcceleration::PreferHardware);
        }
        candidates.push(HardwareAcceleration::PreferSoftware);

        for hardware_acceleration in candidates {
            let config = DecoderConfig {
                codec,
                hardware_acceleration,
            };
            if self.backend.probe(&config) == CodecSupport::Unsupported {
                continue;
            }

            match self.backend.configure(&config) {
                Ok(()) => {
                    log::info!(
                        "Decoder {} configured for {} ({:?})",
                        self.backend.name(),
                        codec,
                        hardware_acceleration
                    );
                    self.config = Some(config);
                    return true;
                }
                Err(e) => log::warn!("Decoder rejected {:?}: {}", config, e),
            }
        }

        log::error!("No decode path for {}", codec);
        false
    }

    /// Decode one chunk. `None` when unconfigured, when the chunk yields no
    /// picture, or on a decode error.
    pub fn decode(&mut self, chunk: &EncodedChunk) -> Option<DecodedFrame> {
        if self.backend.state() != CodecState::Configured {
            log::debug!("Chunk at {}us ignored, decoder not configured", chunk.timestamp_us);
            return None;
        }

        match self.backend.decode(chunk) {
            Ok(Some(frame)) => {
                self.decoded_count += 1;
                Some(frame)
            }
            Ok(None) => None,
            Err(e) => {
                self.error_count += 1;
                log::warn!("Decode failed at {}us: {}", chunk.timestamp_us, e);
                None
            }
        }
    }

    /// Flush and close; returns any frames still buffered. Idempotent.
    pub fn stop(&mut self) -> Vec<DecodedFrame> {
        let mut flushed = Vec::new();
        if self.backend.state() == CodecState::Configured {
            match self.backend.flush() {
                Ok(frames) => flushed = frames,
                Err(e) => log::warn!("Decoder flush failed: {}", e),
            }
        }
        if self.backend.state() != CodecState::Closed {
            self.backend.close();
            log::info!("Decoder {} closed", self.backend.name());
        }
        self.config = None;
        flushed
    }

    pub fn config(&self) -> Option<&DecoderConfig> {
        self.config.as_ref()
    }

    pub fn state(&self) -> CodecState {
        self.backend.state()
    }

    pub fn decoded_count(&self) -> u64 {
        self.decoded_count
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }
}
