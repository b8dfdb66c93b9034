// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2023 Adrian <adrian.eddy at gmail>

//! Scripted codec engine used by the session tests: a configurable stride,
//! a B-frame-style lookahead delay, failure injection and resource accounting.

use super::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Fill value of freshly allocated input planes, so tests can verify that row
/// padding is never written to.
pub const PAD_SENTINEL: u8 = 0xAB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailStage {
    FindEncoder,
    ContextAllocation,
    CodecOpen,
    FrameAllocation,
}

#[derive(Debug, Default)]
pub struct MockStats {
    pub opened: usize,
    pub released: usize,
    pub submitted_pts: Vec<i64>,
    pub emitted_pts: Vec<i64>,
    pub drained_packets: usize,
    /// Per submitted frame: a copy of the three input planes, stride included.
    pub plane_snapshots: Vec<Vec<Vec<u8>>>,
}

pub type StatsHandle = Arc<Mutex<MockStats>>;

pub struct MockEncoder {
    stride_pad: usize,
    delay: usize,
    fail_open: Option<FailStage>,
    fail_on_pts: Option<i64>,
    fail_drain: bool,

    width: usize,
    height: usize,
    stride: usize,
    planes: Option<Vec<Vec<u8>>>,
    lookahead: VecDeque<i64>,
    stats: StatsHandle,
}

impl MockEncoder {
    /// `stride_pad` bytes of row padding beyond the logical width; `delay`
    /// frames held back before the first packet comes out.
    pub fn new(stride_pad: usize, delay: usize) -> Self {
        Self {
            stride_pad,
            delay,
            fail_open: None,
            fail_on_pts: None,
            fail_drain: false,
            width: 0,
            height: 0,
            stride: 0,
            planes: None,
            lookahead: VecDeque::new(),
            stats: StatsHandle::default(),
        }
    }

    pub fn fail_open(mut self, stage: FailStage) -> Self {
        self.fail_open = Some(stage);
        self
    }

    pub fn fail_on_pts(mut self, pts: i64) -> Self {
        self.fail_on_pts = Some(pts);
        self
    }

    pub fn fail_drain(mut self) -> Self {
        self.fail_drain = true;
        self
    }

    /// Grab the accounting handle before the engine moves into a session.
    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }

    fn emit(&mut self, pts: i64) -> CompressedPacket {
        let mut stats = self.stats.lock().unwrap();
        stats.emitted_pts.push(pts);
        CompressedPacket { data: vec![0x00, 0x00, 0x01, pts as u8], pts: Some(pts) }
    }
}

impl EncoderInterface for MockEncoder {
    fn open(&mut self, params: &EncoderParams) -> Result<(), VideoEncodeError> {
        match self.fail_open {
            Some(FailStage::FindEncoder) => return Err(VideoEncodeError::EncoderNotFound),
            Some(FailStage::ContextAllocation) => return Err(VideoEncodeError::ContextAllocation),
            Some(FailStage::CodecOpen) => return Err(VideoEncodeError::CodecOpen),
            Some(FailStage::FrameAllocation) => return Err(VideoEncodeError::FrameAllocation),
            None => { }
        }
        self.width = params.width as usize;
        self.height = params.height as usize;
        self.stride = self.width + self.stride_pad;
        self.planes = Some(vec![vec![PAD_SENTINEL; self.stride * self.height]; 3]);
        self.stats.lock().unwrap().opened += 1;
        Ok(())
    }

    fn input_planes(&mut self) -> Result<Vec<PlaneMut<'_>>, VideoEncodeError> {
        let stride = self.stride;
        let planes = self.planes.as_mut().ok_or(VideoEncodeError::FrameAllocation)?;
        Ok(planes.iter_mut().map(|p| PlaneMut { data: p.as_mut_slice(), stride }).collect())
    }

    fn encode_step(&mut self, pts: Option<i64>) -> Result<Option<CompressedPacket>, VideoEncodeError> {
        match pts {
            Some(pts) => {
                if self.fail_on_pts == Some(pts) {
                    return Err(VideoEncodeError::EncodeStep { pts });
                }
                {
                    let mut stats = self.stats.lock().unwrap();
                    stats.submitted_pts.push(pts);
                    if let Some(planes) = &self.planes {
                        stats.plane_snapshots.push(planes.clone());
                    }
                }
                self.lookahead.push_back(pts);
                if self.lookahead.len() > self.delay {
                    let pts = self.lookahead.pop_front().unwrap();
                    return Ok(Some(self.emit(pts)));
                }
                Ok(None)
            }
            None => {
                if self.fail_drain {
                    return Err(VideoEncodeError::EncodeStep { pts: -1 });
                }
                match self.lookahead.pop_front() {
                    Some(pts) => {
                        self.stats.lock().unwrap().drained_packets += 1;
                        Ok(Some(self.emit(pts)))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    fn close(&mut self) {
        if self.planes.take().is_some() {
            self.stats.lock().unwrap().released += 1;
        }
    }
}
