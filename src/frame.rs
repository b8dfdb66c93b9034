// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2023 Adrian <adrian.eddy at gmail>

//! Raster frame inputs and the planar YUV frame handed to the codec engine.

/// A fixed-size 2D grid of 8-bit RGB pixels, queryable by (row, col).
///
/// `packed_rgb` is an optimization signal only: when the storage is one
/// contiguous row-major `R G B R G B …` block, returning it lets the batch
/// converter skip per-pixel addressing. Correctness never depends on it.
pub trait RgbSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn rgb_at(&self, row: u32, col: u32) -> [u8; 3];
    fn packed_rgb(&self) -> Option<&[u8]> { None }
}

/// Owned packed RGB frame, row-major, 3 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, data: vec![0; width as usize * height as usize * 3] }
    }

    pub fn from_packed(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self { width, height, data })
    }

    pub fn set_rgb(&mut self, row: u32, col: u32, rgb: [u8; 3]) {
        let i = (row as usize * self.width as usize + col as usize) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }
}

impl RgbSource for RgbFrame {
    fn width(&self) -> u32 { self.width }
    fn height(&self) -> u32 { self.height }
    fn rgb_at(&self, row: u32, col: u32) -> [u8; 3] {
        let i = (row as usize * self.width as usize + col as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
    fn packed_rgb(&self) -> Option<&[u8]> { Some(&self.data) }
}

impl RgbSource for image::RgbImage {
    fn width(&self) -> u32 { image::RgbImage::width(self) }
    fn height(&self) -> u32 { image::RgbImage::height(self) }
    fn rgb_at(&self, row: u32, col: u32) -> [u8; 3] {
        self.get_pixel(col, row).0
    }
    fn packed_rgb(&self) -> Option<&[u8]> {
        // ImageBuffer over a Vec is always one contiguous sample block
        Some(self.as_raw())
    }
}

/// Full-resolution planar YUV (4:4:4), each plane tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YuvFrame {
    pub width: u32,
    pub height: u32,
    pub y: Vec<u8>,
    pub u: Vec<u8>,
    pub v: Vec<u8>,
}

impl YuvFrame {
    pub fn new(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self { width, height, y: vec![0; n], u: vec![0; n], v: vec![0; n] }
    }

    pub fn planes(&self) -> [&[u8]; 3] {
        [&self.y, &self.u, &self.v]
    }
}
