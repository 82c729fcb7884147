//! Frame acquisition: grayscale loading, ROI cropping, frame-range checks.
//!
//! Frames are pre-extracted image files; their sorted position in the
//! directory is the frame number.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{TrackResult, TrackingError};

const FRAME_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];
const SHORT_RANGE_WARNING: usize = 5;

/// Region of interest in full-frame pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Roi {
    /// Build from corners `(x1, y1)`-`(x2, y2)`, exclusive at the far corner
    pub fn from_corners(x1: i64, y1: i64, x2: i64, y2: i64) -> TrackResult<Self> {
        if x2 <= x1 {
            return Err(TrackingError::InvalidRoi(format!(
                "x2 ({x2}) must be greater than x1 ({x1})"
            )));
        }
        if y2 <= y1 {
            return Err(TrackingError::InvalidRoi(format!(
                "y2 ({y2}) must be greater than y1 ({y1})"
            )));
        }
        if x1 < 0 || y1 < 0 {
            return Err(TrackingError::InvalidRoi(format!(
                "coordinates must be non-negative (x1={x1}, y1={y1})"
            )));
        }
        Ok(Self {
            x: x1 as usize,
            y: y1 as usize,
            width: (x2 - x1) as usize,
            height: (y2 - y1) as usize,
        })
    }

    /// Check the ROI fits inside a `frame_width x frame_height` frame
    pub fn validate(&self, frame_width: usize, frame_height: usize) -> TrackResult<()> {
        let x2 = self.x + self.width;
        let y2 = self.y + self.height;
        if self.width == 0 || self.height == 0 {
            return Err(TrackingError::InvalidRoi("ROI is empty".to_string()));
        }
        if x2 > frame_width || y2 > frame_height {
            return Err(TrackingError::InvalidRoi(format!(
                "coordinates exceed frame bounds ({frame_width}x{frame_height}), got x2={x2}, y2={y2}"
            )));
        }
        Ok(())
    }

    /// Borrow the ROI out of a full grayscale frame
    pub fn crop<'a>(&self, frame: &'a Array2<u8>) -> TrackResult<ArrayView2<'a, u8>> {
        let (frame_height, frame_width) = frame.dim();
        self.validate(frame_width, frame_height)?;
        Ok(frame.slice(s![self.y..self.y + self.height, self.x..self.x + self.width]))
    }
}

/// Half-open range of frame indices `[start, end)` to track
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: usize,
    pub end: usize,
}

impl FrameRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn validate(&self, frame_count: usize) -> TrackResult<()> {
        if self.end > frame_count {
            return Err(TrackingError::InvalidFrameRange(format!(
                "ending frame {} exceeds the {} available frames",
                self.end, frame_count
            )));
        }
        if self.end <= self.start {
            return Err(TrackingError::InvalidFrameRange(format!(
                "ending frame ({}) must be greater than starting frame ({})",
                self.end, self.start
            )));
        }
        if self.len() < SHORT_RANGE_WARNING {
            warn!(
                "Frame range is very short ({} frames), results may be inaccurate",
                self.len()
            );
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode an image file into an 8-bit grayscale grid indexed `[row, col]`
pub fn load_gray_frame(path: &Path) -> TrackResult<Array2<u8>> {
    let gray = image::open(path)?.into_luma8();
    Ok(luma_to_array(&gray))
}

pub fn luma_to_array(gray: &image::GrayImage) -> Array2<u8> {
    let (width, height) = gray.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(row, col)| {
        gray.get_pixel(col as u32, row as u32)[0]
    })
}

/// Image files in `dir`, sorted by file name
pub fn list_frame_files(dir: &Path) -> TrackResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
