// src/inference.rs
//
// ONNX Runtime backend for the pose extractor. Expects a single-person
// BlazePose-style landmark model:
//   input   [1, S, S, 3] float RGB in [0, 1]
//   output0 [1, 39 * 5]  (x, y, z, visibility, presence) in input pixels
//   output1 [1, 1]       pose presence probability

use crate::error::AnalysisError;
use crate::landmarks::NUM_LANDMARKS;
use crate::pose::{PoseModel, PoseModelFactory, RoiTracker};
use crate::preprocessing::{self, Roi};
use crate::types::{Keypoint, PoseConfig, RgbFrame, Skeleton};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::{debug, info};

const VALUES_PER_LANDMARK: usize = 5;

pub struct OnnxPoseModel {
    session: Session,
    config: PoseConfig,
    tracker: RoiTracker,
}

impl OnnxPoseModel {
    pub fn new(config: PoseConfig) -> Result<Self, AnalysisError> {
        info!("Loading pose model: {}", config.model_path);

        if !Path::new(&config.model_path).exists() {
            return Err(AnalysisError::PoseModel(format!(
                "model file not found: {}",
                config.model_path
            )));
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.num_threads.max(1))?
            .with_inter_threads(1)?
            .commit_from_file(&config.model_path)?;

        info!("✓ Pose model initialized");

        let tracker = RoiTracker::new(config.roi_expansion);
        Ok(Self {
            session,
            config,
            tracker,
        })
    }

    fn infer(&mut self, input: Vec<f32>) -> Result<(Vec<f32>, f32), AnalysisError> {
        let size = self.config.input_size;
        let shape = [1, size, size, 3];
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), input.into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() < 2 {
            return Err(AnalysisError::PoseModel(format!(
                "expected 2 model outputs, got {}",
                outputs.len()
            )));
        }

        let (_, landmarks) = outputs[0].try_extract_tensor::<f32>()?;
        let (_, presence) = outputs[1].try_extract_tensor::<f32>()?;

        let presence = presence.first().copied().unwrap_or(0.0);
        Ok((landmarks.to_vec(), presence))
    }

    fn decode(
        &self,
        raw: &[f32],
        roi: &Roi,
        frame_w: usize,
        frame_h: usize,
    ) -> Result<Skeleton, AnalysisError> {
        if raw.len() < NUM_LANDMARKS * VALUES_PER_LANDMARK {
            return Err(AnalysisError::PoseModel(format!(
                "landmark tensor too small: {} values",
                raw.len()
            )));
        }

        let size = self.config.input_size;
        let points = raw
            .chunks_exact(VALUES_PER_LANDMARK)
            .take(NUM_LANDMARKS)
            .map(|v| {
                let (x, y) = roi.to_frame_normalized(v[0], v[1], size, frame_w, frame_h);
                // z shares the x scale of the crop
                let z = v[2] * roi.size / size as f32 / frame_w as f32;
                Keypoint::new(x, y, z, sigmoid(v[3]))
            })
            .collect();

        Skeleton::new(points)
            .ok_or_else(|| AnalysisError::PoseModel("incomplete skeleton".into()))
    }
}

impl PoseModel for OnnxPoseModel {
    fn detect(
        &mut self,
        frame: &RgbFrame,
        timestamp_ms: u64,
    ) -> Result<Option<Skeleton>, AnalysisError> {
        let roi = self.tracker.roi_for(frame.width, frame.height);
        let input = preprocessing::preprocess(frame, &roi, self.config.input_size);

        let (raw, presence) = self.infer(input)?;
        let presence = presence.clamp(0.0, 1.0);
        if presence < self.config.min_presence {
            debug!("Pose presence {:.2} below threshold at {} ms", presence, timestamp_ms);
            self.tracker.update(None);
            return Ok(None);
        }

        let skeleton = self.decode(&raw, &roi, frame.width, frame.height)?;
        self.tracker.update(Some(&skeleton));
        Ok(Some(skeleton))
    }

    fn close(&mut self) {
        info!("Releasing ONNX pose session");
    }
}

/// Loads a new session for every video
pub struct OnnxPoseModelFactory {
    config: PoseConfig,
}

impl OnnxPoseModelFactory {
    pub fn new(config: PoseConfig) -> Self {
        Self { config }
    }
}

impl PoseModelFactory for OnnxPoseModelFactory {
    fn create(&self) -> Result<Box<dyn PoseModel>, AnalysisError> {
        Ok(Box::new(OnnxPoseModel::new(self.config.clone())?))
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file() {
        let config = PoseConfig {
            model_path: "/nonexistent/pose.onnx".into(),
            ..Default::default()
        };
        let factory = OnnxPoseModelFactory::new(config);
        assert!(matches!(factory.create(), Err(AnalysisError::PoseModel(_))));
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}
