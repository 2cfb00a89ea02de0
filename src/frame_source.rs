// src/frame_source.rs
//
// Video decoding with fixed-rate resampling. Timestamps are synthesized
// from the number of frames already emitted; container frame rate only
// decides which decoded frames are skipped.

use crate::error::AnalysisError;
use crate::types::{RgbFrame, SampledFrame};
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::Path;
use tracing::{info, warn};

const MAX_PLAUSIBLE_FPS: f64 = 120.0;

/// Sampling arithmetic shared by every FrameSource
#[derive(Debug, Clone)]
pub struct FrameClock {
    target_fps: u32,
    stride: u64,
    decoded: u64,
    emitted: u64,
}

impl FrameClock {
    pub fn new(source_fps: f64, target_fps: u32) -> Self {
        let target_fps = target_fps.max(1);
        let source_fps = if source_fps.is_finite() && source_fps > 0.0 && source_fps <= MAX_PLAUSIBLE_FPS
        {
            source_fps
        } else {
            warn!(
                "Invalid container FPS ({}), assuming {} for frame sampling",
                source_fps, target_fps
            );
            target_fps as f64
        };

        let stride = ((source_fps / target_fps as f64).round() as u64).max(1);

        Self {
            target_fps,
            stride,
            decoded: 0,
            emitted: 0,
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Registers one decoded frame; returns its timestamp if it should be emitted
    pub fn tick(&mut self) -> Option<u64> {
        let index = self.decoded;
        self.decoded += 1;

        if index % self.stride != 0 {
            return None;
        }

        // Starts at 1 ms: the pose tracker rejects a zero timestamp
        let ts = 1 + self.emitted * 1000 / self.target_fps as u64;
        self.emitted += 1;
        Some(ts)
    }
}

/// Lazy, finite, non-restartable stream of sampled RGB frames
pub struct FrameSource {
    cap: Option<VideoCapture>,
    clock: FrameClock,
}

impl FrameSource {
    pub fn open(path: &Path, target_fps: u32) -> Result<Self, AnalysisError> {
        info!("Opening video: {}", path.display());

        let path_str = path
            .to_str()
            .ok_or_else(|| AnalysisError::Decode(format!("non UTF-8 path {}", path.display())))?;

        let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            return Err(AnalysisError::Decode(format!(
                "failed to open video {}",
                path.display()
            )));
        }

        let fps = cap.get(videoio::CAP_PROP_FPS)?;
        let total_frames = cap.get(videoio::CAP_PROP_FRAME_COUNT)? as i64;
        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as usize;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as usize;

        let clock = FrameClock::new(fps, target_fps);

        info!(
            "Video properties: {}x{} @ {:.2} FPS, {} frames | stride {}, target {} FPS",
            width,
            height,
            fps,
            total_frames,
            clock.stride(),
            target_fps
        );

        Ok(Self {
            cap: Some(cap),
            clock,
        })
    }

    fn read_next(&mut self) -> Result<Option<SampledFrame>, AnalysisError> {
        loop {
            let Some(cap) = self.cap.as_mut() else {
                return Ok(None);
            };

            let mut mat = Mat::default();
            if !cap.read(&mut mat)? || mat.empty() {
                self.release();
                return Ok(None);
            }

            let Some(timestamp_ms) = self.clock.tick() else {
                continue;
            };

            let mut rgb = Mat::default();
            imgproc::cvt_color_def(&mat, &mut rgb, imgproc::COLOR_BGR2RGB)?;

            let image = RgbFrame {
                data: rgb.data_bytes()?.to_vec(),
                width: rgb.cols() as usize,
                height: rgb.rows() as usize,
            };

            return Ok(Some(SampledFrame {
                image,
                timestamp_ms,
            }));
        }
    }

    fn release(&mut self) {
        if let Some(mut cap) = self.cap.take() {
            if let Err(e) = cap.release() {
                warn!("Failed to release video capture: {}", e);
            }
            info!("Decoded video released ({} frames emitted)", self.clock.emitted());
        }
    }
}

impl Iterator for FrameSource {
    type Item = Result<SampledFrame, AnalysisError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.release();
                Some(Err(e))
            }
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}
