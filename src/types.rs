// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2023 Adrian <adrian.eddy at gmail>

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    RGB24,
    YUV444P,
}

/// Codecs the encoder can produce. Currently a single family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
}

impl VideoCodec {
    pub const DEFAULT: VideoCodec = VideoCodec::H264;

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "h264" | "h.264" | "avc" | "libx264" => Some(VideoCodec::H264),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Initialized,
    Writing,
    Closed,
}

/// Non-fatal outcome of a successful [`crate::Encoder::initialize`].
///
/// `Initialized` is plain success. `FallbackCodec` means the requested codec
/// name was not recognized and the default codec was substituted; the session
/// proceeds and writes encode with the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Initialized,
    FallbackCodec(VideoCodec),
}

#[derive(Error, Debug)]
pub enum VideoEncodeError {
    #[error("Could not open output sink: {0}")]
    SinkOpen(#[source] std::io::Error),
    #[error("Encoder not found")]
    EncoderNotFound,
    #[error("Could not allocate encoder context")]
    ContextAllocation,
    #[error("Could not open codec")]
    CodecOpen,
    #[error("Could not allocate frame buffer")]
    FrameAllocation,
    #[error("Frame is {got_width}x{got_height} but the session is bound to {want_width}x{want_height}")]
    ResolutionMismatch { got_width: u32, got_height: u32, want_width: u32, want_height: u32 },
    #[error("Error encoding frame #{pts}")]
    EncodeStep { pts: i64 },
    #[error("Error writing to the output sink: {0}")]
    SinkWrite(#[from] std::io::Error),
    #[error("{op} is not valid in state {state:?}")]
    InvalidState { op: &'static str, state: SessionState },
    #[cfg(feature = "ffmpeg")]
    #[error("ffmpeg error: {0:?}")]
    InternalError(#[from] ffmpeg_next::Error),
}
