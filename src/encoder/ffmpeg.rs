// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2023 Adrian <adrian.eddy at gmail>

use super::*;
use crate::types::{PixelFormat, VideoCodec, VideoEncodeError};

use ffmpeg_next::{ codec, encoder, frame, Dictionary, Rational };

pub struct FfmpegEncoder {
    encoder: Option<encoder::video::Encoder>,
    frame: Option<frame::Video>,
    draining: bool,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self { encoder: None, frame: None, draining: false }
    }

    fn receive(&mut self) -> Result<Option<CompressedPacket>, VideoEncodeError> {
        let Some(enc) = self.encoder.as_mut() else { return Ok(None) };
        let mut packet = ffmpeg_next::Packet::empty();
        match enc.receive_packet(&mut packet) {
            Ok(()) => {
                let data = packet.data().map(|d| d.to_vec()).unwrap_or_default();
                Ok(Some(CompressedPacket { data, pts: packet.pts() }))
            }
            // EAGAIN while the lookahead fills up, EOF once the drain is done
            Err(_) => Ok(None),
        }
    }
}

impl EncoderInterface for FfmpegEncoder {
    fn open(&mut self, params: &EncoderParams) -> Result<(), VideoEncodeError> {
        ffmpeg_next::init()?;

        let codec_id = match params.codec {
            VideoCodec::H264 => codec::Id::H264,
        };
        let codec = encoder::find(codec_id).ok_or(VideoEncodeError::EncoderNotFound)?;

        let mut ctx = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| {
                log::error!("Could not allocate video codec context: {e:?}");
                VideoEncodeError::ContextAllocation
            })?;

        let pix_fmt = match params.format {
            PixelFormat::YUV444P => ffmpeg_next::format::Pixel::YUV444P,
            PixelFormat::RGB24 => ffmpeg_next::format::Pixel::RGB24,
        };

        ctx.set_width(params.width);
        ctx.set_height(params.height);
        ctx.set_format(pix_fmt);
        ctx.set_time_base(Rational::new(1, params.fps as i32));
        ctx.set_frame_rate(Some(Rational::new(params.fps as i32, 1)));
        ctx.set_gop(params.gop_size);
        ctx.set_max_b_frames(params.max_b_frames as usize);
        if !params.fixed_qp {
            ctx.set_bit_rate(params.bitrate as usize);
        }

        let mut opts = Dictionary::new();
        opts.set("preset", &params.preset);
        if params.fixed_qp {
            opts.set("qp", &params.qp.to_string());
        }
        if let Some(profile) = &params.profile {
            opts.set("profile", profile);
        }
        for (k, v) in &params.custom_options {
            opts.set(k, v);
        }

        let opened = ctx.open_with(opts).map_err(|e| {
            log::error!("Could not open codec: {e:?}");
            VideoEncodeError::CodecOpen
        })?;

        let av_frame = frame::Video::new(pix_fmt, params.width, params.height);
        if unsafe { av_frame.is_empty() } {
            log::error!("Could not allocate raw picture buffer");
            return Err(VideoEncodeError::FrameAllocation);
        }

        self.encoder = Some(opened);
        self.frame = Some(av_frame);
        self.draining = false;
        Ok(())
    }

    fn input_planes(&mut self) -> Result<Vec<PlaneMut<'_>>, VideoEncodeError> {
        let frame = self.frame.as_mut().ok_or(VideoEncodeError::FrameAllocation)?;
        let height = frame.height() as usize; // 4:4:4, every plane is full height
        let mut ret = Vec::with_capacity(frame.planes());
        for plane in 0..frame.planes() {
            let stride = frame.stride(plane);
            unsafe {
                ret.push(PlaneMut {
                    data: std::slice::from_raw_parts_mut((*frame.as_mut_ptr()).data[plane], stride * height),
                    stride,
                });
            }
        }
        Ok(ret)
    }

    fn encode_step(&mut self, pts: Option<i64>) -> Result<Option<CompressedPacket>, VideoEncodeError> {
        match pts {
            Some(pts) => {
                let (Some(enc), Some(frame)) = (self.encoder.as_mut(), self.frame.as_mut()) else {
                    return Err(VideoEncodeError::EncodeStep { pts });
                };
                frame.set_pts(Some(pts));
                enc.send_frame(frame)?;
            }
            None => {
                if !self.draining {
                    self.draining = true;
                    if let Some(enc) = self.encoder.as_mut() {
                        enc.send_eof()?;
                    }
                }
            }
        }
        self.receive()
    }

    fn close(&mut self) {
        // dropping the context and frame releases the engine allocations
        self.encoder = None;
        self.frame = None;
    }
}
