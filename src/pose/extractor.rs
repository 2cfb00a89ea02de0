// src/pose/extractor.rs

use crate::error::AnalysisError;
use crate::types::{RgbFrame, Skeleton, ValidationConfig};
use tracing::{debug, error, info};

const LOGGED_FRAMES: usize = 5;

/// A pose-estimation backend bound to one video.
///
/// Implementations may keep tracking state between calls, so frames must
/// arrive in strictly increasing timestamp order.
pub trait PoseModel: Send {
    fn detect(
        &mut self,
        frame: &RgbFrame,
        timestamp_ms: u64,
    ) -> Result<Option<Skeleton>, AnalysisError>;

    /// Releases model resources. Called once, before drop.
    fn close(&mut self) {}
}

/// Produces a fresh, exclusively owned model for every video
pub trait PoseModelFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn PoseModel>, AnalysisError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtractionStats {
    pub frames_processed: usize,
    pub frames_with_pose: usize,
}

impl ExtractionStats {
    pub fn detection_ratio(&self) -> f64 {
        if self.frames_processed == 0 {
            0.0
        } else {
            self.frames_with_pose as f64 / self.frames_processed as f64
        }
    }

    /// Data-quality gate applied once the whole video has been processed
    pub fn validate(&self, cfg: &ValidationConfig) -> Result<(), AnalysisError> {
        if self.frames_processed == 0 {
            return Err(AnalysisError::NoFramesExtracted);
        }
        if self.frames_with_pose == 0 {
            return Err(AnalysisError::NoPoseDetected);
        }
        if self.detection_ratio() < cfg.min_detection_ratio {
            return Err(AnalysisError::InsufficientPoseDetection {
                frames_with_pose: self.frames_with_pose,
                frames_processed: self.frames_processed,
            });
        }
        Ok(())
    }
}

/// Feeds one video's frames to its own model instance.
///
/// The model is released by `close()` or, on any other exit path, by `Drop`.
pub struct PoseExtractor {
    model: Option<Box<dyn PoseModel>>,
    last_timestamp_ms: Option<u64>,
    stats: ExtractionStats,
}

impl PoseExtractor {
    pub fn new(model: Box<dyn PoseModel>) -> Self {
        info!("Created pose extractor with a fresh model instance");
        Self {
            model: Some(model),
            last_timestamp_ms: None,
            stats: ExtractionStats::default(),
        }
    }

    /// Runs pose estimation on one frame.
    ///
    /// # Panics
    /// If `timestamp_ms` is not strictly greater than the previous call's.
    pub fn process(
        &mut self,
        frame: &RgbFrame,
        timestamp_ms: u64,
    ) -> Result<Option<Skeleton>, AnalysisError> {
        let monotonic = self.last_timestamp_ms.map_or(true, |last| timestamp_ms > last);
        self.stats.frames_processed += 1;

        if self.stats.frames_processed <= LOGGED_FRAMES {
            info!(
                "Pose frame {}: timestamp_ms={}, prev={:?}, monotonic={}",
                self.stats.frames_processed,
                timestamp_ms,
                self.last_timestamp_ms,
                if monotonic { "✓" } else { "✗" }
            );
        }
        if !monotonic {
            error!(
                "Timestamp {} is not after previous {:?}",
                timestamp_ms, self.last_timestamp_ms
            );
        }
        assert!(
            monotonic,
            "pose timestamps must be strictly increasing ({} after {:?})",
            timestamp_ms,
            self.last_timestamp_ms
        );
        self.last_timestamp_ms = Some(timestamp_ms);

        let model = self
            .model
            .as_mut()
            .ok_or_else(|| AnalysisError::PoseModel("extractor already closed".into()))?;

        let skeleton = model.detect(frame, timestamp_ms)?;
        if skeleton.is_some() {
            self.stats.frames_with_pose += 1;
        } else {
            debug!("No pose at {} ms", timestamp_ms);
        }
        Ok(skeleton)
    }

    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }

    /// Releases the model and returns the final counts
    pub fn close(mut self) -> ExtractionStats {
        self.release();
        self.stats
    }

    fn release(&mut self) {
        if let Some(mut model) = self.model.take() {
            model.close();
            info!(
                "Closed pose model ({} frames, {} with pose)",
                self.stats.frames_processed, self.stats.frames_with_pose
            );
        }
    }
}

impl Drop for PoseExtractor {
    fn drop(&mut self) {
        self.release();
    }
}
