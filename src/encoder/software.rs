//! OpenH264 software backends
//!
//! Software-only H.264 paths used when no hardware encoder is reported.

use super::codec::{
    CodecState, CodecSupport, DecoderBackend, DecoderConfig, EncoderBackend, EncoderConfig,
};
use super::frame::{DecodedFrame, EncodedChunk, PixelFormat, VideoFrame};
use crate::errors::{CopilotError, CopilotResult};
use bytes::Bytes;
use openh264::decoder::Decoder;
use openh264::encoder::{Encoder, FrameType};
use openh264::formats::{YUVBuffer, YUVSource};

/// H.264 encoder backed by openh264
pub struct OpenH264Encoder {
    encoder: Option<Encoder>,
    config: Option<EncoderConfig>,
    state: CodecState,
}

impl OpenH264Encoder {
    pub fn new() -> Self {
        Self {
            encoder: None,
            config: None,
            state: CodecState::Unconfigured,
        }
    }
}

impl Default for OpenH264Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderBackend for OpenH264Encoder {
    fn name(&self) -> &str {
        "openh264"
    }

    fn probe(&self, config: &EncoderConfig) -> CodecSupport {
        if config.codec.is_h264() && config.width % 2 == 0 && config.height % 2 == 0 {
            CodecSupport::Software
        } else {
            CodecSupport::Unsupported
        }
    }

    fn configure(&mut self, config: &EncoderConfig) -> CopilotResult<()> {
        if self.state == CodecState::Closed {
            return Err(CopilotError::Encoder("encoder is closed".to_string()));
        }
        if self.probe(config) == CodecSupport::Unsupported {
            return Err(CopilotError::Encoder(format!(
                "unsupported configuration: {} {}x{}",
                config.codec, config.width, config.height
            )));
        }

        // Dimensions are taken from each YUV source at encode time.
        let encoder = Encoder::new()
            .map_err(|e| CopilotError::Encoder(format!("Failed to create encoder: {}", e)))?;

        self.encoder = Some(encoder);
        self.config = Some(config.clone());
        self.state = CodecState::Configured;
        Ok(())
    }

    fn encode(&mut self, frame: &VideoFrame, key_frame: bool) -> CopilotResult<EncodedChunk> {
        let (Some(encoder), Some(config)) = (self.encoder.as_mut(), self.config.as_ref()) else {
            return Err(CopilotError::NotInitialized("openh264 encoder".to_string()));
        };

        if !frame.is_complete() {
            return Err(CopilotError::Encoder(format!(
                "Invalid frame size: {} bytes for {}x{} {:?}",
                frame.data.len(),
                frame.width,
                frame.height,
                frame.format
            )));
        }

        let yuv = match frame.format {
            PixelFormat::Rgb8 => rgb_to_yuv420(&frame.data, frame.width, frame.height),
            PixelFormat::I420 => frame.data.to_vec(),
        };
        let yuv_buffer = YUVBuffer::from_vec(yuv, frame.width as usize, frame.height as usize);

        if key_frame {
            encoder.force_intra_frame();
        }

        let bitstream = encoder
            .encode(&yuv_buffer)
            .map_err(|e| CopilotError::Encoder(format!("Encoding failed: {}", e)))?;

        let is_key_frame = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);

        Ok(EncodedChunk {
            data: Bytes::from(bitstream.to_vec()),
            timestamp_us: frame.timestamp_us,
            key_frame: is_key_frame,
            codec: config.codec,
        })
    }

    /// Recorded only; openh264's default rate control is not retuned at
    /// runtime.
    fn set_bitrate(&mut self, bitrate: u32) -> CopilotResult<()> {
        match self.config.as_mut() {
            Some(config) if self.state == CodecState::Configured => {
                config.bitrate = bitrate;
                Ok(())
            }
            _ => Err(CopilotError::NotInitialized("openh264 encoder".to_string())),
        }
    }

    fn flush(&mut self) -> CopilotResult<Vec<EncodedChunk>> {
        // Each encode call emits a complete access unit.
        Ok(Vec::new())
    }

    fn close(&mut self) {
        self.encoder = None;
        self.state = CodecState::Closed;
    }

    fn state(&self) -> CodecState {
        self.state
    }
}

/// H.264 decoder backed by openh264
pub struct OpenH264Decoder {
    decoder: Option<Decoder>,
    state: CodecState,
}

impl OpenH264Decoder {
    pub fn new() -> Self {
        Self {
            decoder: None,
            state: CodecState::Unconfigured,
        }
    }
}

impl Default for OpenH264Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderBackend for OpenH264Decoder {
    fn name(&self) -> &str {
        "openh264"
    }

    fn probe(&self, config: &DecoderConfig) -> CodecSupport {
        if config.codec.is_h264() {
            CodecSupport::Software
        } else {
            CodecSupport::Unsupported
        }
    }

    fn configure(&mut self, config: &DecoderConfig) -> CopilotResult<()> {
        if self.state != CodecState::Unconfigured {
            return Err(CopilotError::Decoder(format!(
                "cannot configure from {:?}",
                self.state
            )));
        }
        if self.probe(config) == CodecSupport::Unsupported {
            return Err(CopilotError::Decoder(format!("unsupported codec {}", config.codec)));
        }

        let decoder = Decoder::new()
            .map_err(|e| CopilotError::Decoder(format!("Failed to create decoder: {}", e)))?;
        self.decoder = Some(decoder);
        self.state = CodecState::Configured;
        Ok(())
    }

    fn decode(&mut self, chunk: &EncodedChunk) -> CopilotResult<Option<DecodedFrame>> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Err(CopilotError::NotInitialized("openh264 decoder".to_string()));
        };

        let decoded = decoder
            .decode(&chunk.data)
            .map_err(|e| CopilotError::Decoder(format!("Decoding failed: {}", e)))?;

        Ok(decoded.map(|yuv| {
            let (width, height) = yuv.dimensions();
            let mut rgb = vec![0u8; width * height * 3];
            yuv.write_rgb8(&mut rgb);
            DecodedFrame {
                data: Bytes::from(rgb),
                width: width as u32,
                height: height as u32,
                format: PixelFormat::Rgb8,
                timestamp_us: chunk.timestamp_us,
            }
        }))
    }

    fn flush(&mut self) -> CopilotResult<Vec<DecodedFrame>> {
        Ok(Vec::new())
    }

    fn close(&mut self) {
        self.decoder = None;
        self.state = CodecState::Closed;
    }

    fn state(&self) -> CodecState {
        self.state
    }
}

/// Convert packed RGB24 to planar I420 (BT.601)
pub fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for (row, pixels) in rgb.chunks_exact(w * 3).take(h).enumerate() {
        for (col, px) in pixels.chunks_exact(3).enumerate() {
            let (r, g, b) = (px[0] as i32, px[1] as i32, px[2] as i32);

            let luma = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[row * w + col] = luma.clamp(0, 255) as u8;

            // One chroma sample per 2x2 block, taken from its top-left pixel
            if row % 2 == 0 && col % 2 == 0 && col / 2 < w / 2 && row / 2 < h / 2 {
                let uv_idx = (row / 2) * (w / 2) + col / 2;
                let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u.clamp(0, 255) as u8;
                v_plane[uv_idx] = v.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}
