// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2023 Adrian <adrian.eddy at gmail>

//! The encoding session: configuration, lifecycle state machine, frame
//! submission and the flush/finalize protocol.

#[cfg(feature = "ffmpeg")] pub(crate) mod ffmpeg;
#[cfg(test)] pub(crate) mod mock;

use crate::conversion;
use crate::frame::{RgbSource, YuvFrame};
use crate::io::{OutputSink, SinkSpec};
use crate::types::*;

use std::collections::HashMap;

/// A raw elementary stream ends with this sequence end code.
pub const SEQUENCE_END_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB7];

pub const DEFAULT_BITRATE: u32 = 1_000_000;
pub const DEFAULT_FPS: u32 = 25;
pub const DEFAULT_GOP_SIZE: u32 = 300;
pub const DEFAULT_MAX_B_FRAMES: u32 = 3;
pub const DEFAULT_PRESET: &str = "medium";

/// Upper bound the fixed quantizer is clamped to. Matches x264's extended QP
/// range; other codec families may use a different ceiling.
pub const MAX_QP: i32 = 69;

/// Everything the codec engine needs to open an encoder.
///
/// Built with defaults and adjusted through the session setters while the
/// session is still in `Created`; frozen afterwards.
#[derive(Debug, Clone)]
pub struct EncoderParams {
    pub width: u32,
    pub height: u32,
    pub codec: VideoCodec,
    pub format: PixelFormat,
    pub bitrate: u32,
    pub qp: u8,
    pub fixed_qp: bool,
    pub fps: u32,
    pub gop_size: u32,
    pub max_b_frames: u32,
    pub preset: String,
    pub profile: Option<String>,
    pub custom_options: HashMap<String, String>,
}

impl EncoderParams {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            // the codec family requires even dimensions
            width: (width & !1).max(2),
            height: (height & !1).max(2),
            codec: VideoCodec::DEFAULT,
            // full-chroma planar, lossless-friendly transfer from packed RGB
            format: PixelFormat::YUV444P,
            bitrate: DEFAULT_BITRATE,
            qp: 0,
            fixed_qp: false,
            fps: DEFAULT_FPS,
            gop_size: DEFAULT_GOP_SIZE,
            max_b_frames: DEFAULT_MAX_B_FRAMES,
            preset: DEFAULT_PRESET.to_string(),
            profile: None,
            custom_options: HashMap::new(),
        }
    }
}

/// One plane of the engine's reusable input buffer. Rows may be padded beyond
/// the logical width; `stride` is the engine-reported distance between row
/// starts.
pub struct PlaneMut<'a> {
    pub data: &'a mut [u8],
    pub stride: usize,
}

/// A self-delimiting compressed bitstream unit. Written to the sink verbatim.
pub struct CompressedPacket {
    pub data: Vec<u8>,
    pub pts: Option<i64>,
}

/// The consumed interface of the codec engine.
#[enum_dispatch::enum_dispatch(EncoderBackend)]
pub trait EncoderInterface {
    /// Find the encoder, allocate its context, open the codec and allocate the
    /// reusable input frame buffer. Every failure stage maps to a distinct
    /// [`VideoEncodeError`] variant.
    fn open(&mut self, params: &EncoderParams) -> Result<(), VideoEncodeError>;

    /// Borrow the reusable input buffer planes. Contents are overwritten in
    /// place on every write, so nothing may hold them across calls.
    fn input_planes(&mut self) -> Result<Vec<PlaneMut<'_>>, VideoEncodeError>;

    /// One demand-driven encode step. `Some(pts)` submits the current input
    /// buffer, `None` drains buffered lookahead. `Ok(None)` means the step
    /// produced no output: a submitted frame may be held back by B-frame
    /// reordering, a drain step with no output means draining is complete.
    fn encode_step(&mut self, pts: Option<i64>) -> Result<Option<CompressedPacket>, VideoEncodeError>;

    /// Release the codec context and frame buffer. Safe to call repeatedly.
    fn close(&mut self);
}

#[enum_dispatch::enum_dispatch]
pub enum EncoderBackend {
    #[cfg(feature = "ffmpeg")]
    FfmpegEncoder(ffmpeg::FfmpegEncoder),
    NullEncoder(NullEncoder),
    #[cfg(test)]
    MockEncoder(mock::MockEncoder),
}

/// Stand-in when no codec backend is compiled in.
pub struct NullEncoder;

impl EncoderInterface for NullEncoder {
    fn open(&mut self, _params: &EncoderParams) -> Result<(), VideoEncodeError> {
        Err(VideoEncodeError::EncoderNotFound)
    }
    fn input_planes(&mut self) -> Result<Vec<PlaneMut<'_>>, VideoEncodeError> {
        Err(VideoEncodeError::EncoderNotFound)
    }
    fn encode_step(&mut self, _pts: Option<i64>) -> Result<Option<CompressedPacket>, VideoEncodeError> {
        Ok(None)
    }
    fn close(&mut self) { }
}

#[cfg(feature = "ffmpeg")]
fn default_backend() -> EncoderBackend {
    ffmpeg::FfmpegEncoder::new().into()
}

#[cfg(not(feature = "ffmpeg"))]
fn default_backend() -> EncoderBackend {
    NullEncoder.into()
}

/// A single-use encoding session.
///
/// Lifecycle: `new` → setters → [`initialize`](Self::initialize) →
/// [`write`](Self::write) per frame in capture order → [`close`](Self::close)
/// exactly once. All calls run to completion on the calling thread; sharing a
/// session between threads requires external mutual exclusion.
pub struct Encoder<'a> {
    params: EncoderParams,
    codec_request: String,
    engine: EncoderBackend,
    sink: OutputSink<'a>,
    state: SessionState,
    // presentation timestamp counter, pre-incremented per submitted frame
    frame_n: i64,
    init_status: Option<InitStatus>,
}

impl<'a> Encoder<'a> {
    /// Open `output` for binary writing and set up an unconfigured session.
    ///
    /// A sink that cannot be opened is fatal and non-retriable; the returned
    /// error is the only thing the caller gets.
    pub fn new<O: Into<SinkSpec<'a>>>(output: O, width: u32, height: u32, codec: &str) -> Result<Self, VideoEncodeError> {
        Self::with_backend(output, width, height, codec, default_backend())
    }

    pub(crate) fn with_backend<O: Into<SinkSpec<'a>>>(output: O, width: u32, height: u32, codec: &str, engine: EncoderBackend) -> Result<Self, VideoEncodeError> {
        let sink = OutputSink::open(output.into())?;
        if width != (width & !1).max(2) || height != (height & !1).max(2) {
            log::warn!("Resolution {width}x{height} is not even, rounding down");
        }
        Ok(Self {
            params: EncoderParams::new(width, height),
            codec_request: codec.to_string(),
            engine,
            sink,
            state: SessionState::Created,
            frame_n: -1,
            init_status: None,
        })
    }

    pub fn state(&self) -> SessionState { self.state }
    pub fn params(&self) -> &EncoderParams { &self.params }

    /// Outcome of `initialize`, once it succeeded.
    pub fn init_status(&self) -> Option<InitStatus> { self.init_status }

    fn config_mut(&mut self, op: &str) -> Option<&mut EncoderParams> {
        if self.state != SessionState::Created {
            log::warn!("{op} ignored: configuration is frozen once the session is initialized");
            return None;
        }
        Some(&mut self.params)
    }

    /// Target bitrate in bits per second. Only used while bitrate rate control
    /// is active (the default).
    pub fn set_bitrate(&mut self, bits_per_sec: i64) {
        if let Some(p) = self.config_mut("set_bitrate") {
            p.bitrate = bits_per_sec.clamp(1, u32::MAX as i64) as u32;
        }
    }

    /// Fixed quantization parameter, clamped to `0..=69`. 0 is lossless. Only
    /// used once bitrate rate control is disabled via `use_fixed_qp(true)`.
    pub fn set_qp(&mut self, qp: i32) {
        if let Some(p) = self.config_mut("set_qp") {
            p.qp = qp.clamp(0, MAX_QP) as u8;
        }
    }

    /// Disable bitrate rate control in favor of the fixed quantizer.
    pub fn use_fixed_qp(&mut self, enabled: bool) {
        if let Some(p) = self.config_mut("use_fixed_qp") {
            p.fixed_qp = enabled;
        }
    }

    pub fn set_fps(&mut self, fps: i32) {
        if let Some(p) = self.config_mut("set_fps") {
            p.fps = fps.max(1) as u32;
        }
    }

    /// Maximum number of frames between forced keyframes.
    pub fn set_gop_size(&mut self, gop_size: i32) {
        if let Some(p) = self.config_mut("set_gop_size") {
            p.gop_size = gop_size.max(1) as u32;
        }
    }

    /// Maximum number of consecutive B-frames.
    pub fn set_b_frames(&mut self, max_b_frames: i32) {
        if let Some(p) = self.config_mut("set_b_frames") {
            p.max_b_frames = max_b_frames.max(0) as u32;
        }
    }

    /// Speed/quality tradeoff, passed through to the codec uninterpreted.
    pub fn set_preset(&mut self, preset: &str) {
        if let Some(p) = self.config_mut("set_preset") {
            p.preset = preset.to_string();
        }
    }

    /// Feature-subset profile, passed through to the codec uninterpreted.
    pub fn set_profile(&mut self, profile: &str) {
        if let Some(p) = self.config_mut("set_profile") {
            p.profile = Some(profile.to_string());
        }
    }

    /// Free-form codec option, passed through to the codec uninterpreted.
    pub fn set_option(&mut self, key: &str, value: &str) {
        if let Some(p) = self.config_mut("set_option") {
            p.custom_options.insert(key.to_string(), value.to_string());
        }
    }

    /// Bind the codec engine: resolve the codec, open it with the frozen
    /// configuration and allocate the reusable frame buffer.
    ///
    /// An unrecognized codec name is not fatal: the default codec is
    /// substituted and reported as [`InitStatus::FallbackCodec`].
    pub fn initialize(&mut self) -> Result<InitStatus, VideoEncodeError> {
        if self.state != SessionState::Created {
            return Err(VideoEncodeError::InvalidState { op: "initialize", state: self.state });
        }
        let status = match VideoCodec::from_name(&self.codec_request) {
            Some(codec) => {
                self.params.codec = codec;
                InitStatus::Initialized
            }
            None => {
                log::warn!("Invalid video codec option: {:?}. Default video codec {} is used.", self.codec_request, VideoCodec::DEFAULT.name());
                self.params.codec = VideoCodec::DEFAULT;
                InitStatus::FallbackCodec(VideoCodec::DEFAULT)
            }
        };
        self.engine.open(&self.params)?;
        self.state = SessionState::Initialized;
        self.init_status = Some(status);
        Ok(status)
    }

    /// Convert `frame`, submit it to the codec engine and append whatever
    /// compressed output the engine hands back.
    ///
    /// A frame of the wrong resolution fails with `ResolutionMismatch` and is
    /// dropped; the session stays usable. An engine failure (`EncodeStep`) is
    /// fatal for the session: stop writing, but still call `close`.
    pub fn write<S: RgbSource + ?Sized>(&mut self, frame: &S) -> Result<(), VideoEncodeError> {
        match self.state {
            SessionState::Initialized | SessionState::Writing => {}
            state => return Err(VideoEncodeError::InvalidState { op: "write", state }),
        }
        if frame.width() != self.params.width || frame.height() != self.params.height {
            log::error!("The resolution of the frame changed: got {}x{}, expected {}x{}",
                frame.width(), frame.height(), self.params.width, self.params.height);
            return Err(VideoEncodeError::ResolutionMismatch {
                got_width: frame.width(),
                got_height: frame.height(),
                want_width: self.params.width,
                want_height: self.params.height,
            });
        }
        self.state = SessionState::Writing;

        let yuv = conversion::frame_to_yuv(frame);
        self.fill_input(&yuv)?;

        self.frame_n += 1;
        let pts = self.frame_n;
        match self.engine.encode_step(Some(pts)) {
            Ok(Some(packet)) => self.sink.append(&packet.data)?,
            Ok(None) => { } // held back by lookahead, recovered on flush
            Err(e) => {
                log::error!("Error encoding frame #{pts}: {e}");
                return Err(VideoEncodeError::EncodeStep { pts });
            }
        }
        Ok(())
    }

    // Copy tightly packed planes into the engine's reusable buffer. The
    // buffer's rows may be padded, so the copy follows the engine-reported
    // stride.
    fn fill_input(&mut self, yuv: &YuvFrame) -> Result<(), VideoEncodeError> {
        let (width, height) = (self.params.width as usize, self.params.height as usize);
        let mut planes = self.engine.input_planes()?;
        for (dst, src) in planes.iter_mut().zip(yuv.planes()) {
            if dst.stride == width {
                // rows are contiguous in memory
                dst.data[..width * height].copy_from_slice(src);
            } else {
                for row in 0..height {
                    dst.data[row * dst.stride..][..width].copy_from_slice(&src[row * width..][..width]);
                }
            }
        }
        Ok(())
    }

    /// Drain the frames delayed by B-frame lookahead, append the sequence end
    /// code and release the codec engine.
    ///
    /// A failing drain step stops the drain but never the cleanup: the end
    /// code is still appended and the engine context is still released.
    pub fn flush(&mut self) -> Result<(), VideoEncodeError> {
        match self.state {
            SessionState::Initialized | SessionState::Writing => {}
            state => return Err(VideoEncodeError::InvalidState { op: "flush", state }),
        }
        let mut result = Ok(());
        loop {
            match self.engine.encode_step(None) {
                Ok(Some(packet)) => {
                    if let Err(e) = self.sink.append(&packet.data) {
                        result = Err(e);
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("Error encoding frame #{}: {e}", self.frame_n);
                    result = Err(VideoEncodeError::EncodeStep { pts: self.frame_n });
                    break;
                }
            }
        }
        if let Err(e) = self.sink.append(&SEQUENCE_END_CODE) {
            if result.is_ok() {
                result = Err(e);
            }
        }
        self.engine.close();
        self.state = SessionState::Closed;
        result
    }

    /// Flush the delayed frames, then flush the output sink no matter how the
    /// drain went, and return the drain's verdict.
    ///
    /// Call exactly once, after the last `write`.
    pub fn close(&mut self) -> Result<(), VideoEncodeError> {
        let result = self.flush();
        let sink = self.sink.flush();
        result.and(sink)
    }
}

impl Drop for Encoder<'_> {
    fn drop(&mut self) {
        // releasing twice is fine, the backends release at most once
        self.engine.close();
    }
}
