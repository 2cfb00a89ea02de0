// src/config.rs

use crate::error::AnalysisError;
use crate::types::{
    BilateralConfig, Config, DetectorConfig, FilterConfig, LoggingConfig, MetricsConfig,
    PoseConfig, StabilityWeights, TrendConfig, ValidationConfig, VideoConfig,
};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values no component can work with
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let fail = |msg: String| Err(AnalysisError::Config(msg));

        if self.video.target_fps == 0 {
            return fail("video.target_fps must be > 0".into());
        }
        if self.pose.input_size == 0 {
            return fail("pose.input_size must be > 0".into());
        }
        if self.pose.roi_expansion < 1.0 {
            return fail("pose.roi_expansion must be >= 1.0".into());
        }
        let nyquist = self.video.target_fps as f64 / 2.0;
        if !(self.filter.cutoff_hz > 0.0 && self.filter.cutoff_hz < nyquist) {
            return fail(format!(
                "filter.cutoff_hz must be in (0, {:.1}) for {} fps",
                nyquist, self.video.target_fps
            ));
        }
        if self.detector.grace_period_seconds < 0.0
            || self.detector.time_budget_seconds <= self.detector.grace_period_seconds
        {
            return fail("detector.time_budget_seconds must exceed the grace period".into());
        }
        if self.metrics.cm_per_unit <= 0.0 {
            return fail("metrics.cm_per_unit must be > 0".into());
        }
        if self.metrics.duration_tiers.windows(2).any(|w| w[0] >= w[1]) {
            return fail("metrics.duration_tiers must be strictly increasing".into());
        }
        if (self.metrics.weights.total() - 1.0).abs() > 1e-6 {
            return fail(format!(
                "metrics.weights must sum to 1.0 (got {:.3})",
                self.metrics.weights.total()
            ));
        }
        let b = &self.bilateral;
        let bilateral_total = b.duration_weight + b.sway_weight + b.arm_weight + b.corrections_weight;
        if (bilateral_total - 1.0).abs() > 1e-6 {
            return fail(format!(
                "bilateral weights must sum to 1.0 (got {:.3})",
                bilateral_total
            ));
        }
        if b.arm_angle_ceiling_deg <= 0.0 || b.corrections_ceiling <= 0.0 {
            return fail("bilateral ceilings must be > 0".into());
        }
        if self.trend.recent_window == 0 {
            return fail("trend.recent_window must be >= 1".into());
        }
        if self.validation.min_clip_seconds > self.validation.max_clip_seconds {
            return fail("validation.min_clip_seconds exceeds max_clip_seconds".into());
        }
        if !(0.0..=1.0).contains(&self.validation.min_detection_ratio) {
            return fail("validation.min_detection_ratio must be within [0, 1]".into());
        }
        Ok(())
    }

    /// Env-filter directive for tracing-subscriber
    pub fn log_directive(&self) -> String {
        format!("balance_assessment={},ort=warn", self.logging.level)
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            safety_cutoff_seconds: 35.0,
        }
    }
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            model_path: "models/pose_landmark_full.onnx".to_string(),
            input_size: 256,
            num_threads: 1,
            min_presence: 0.5,
            roi_expansion: 1.5,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: 2.0,
            max_pad: 10,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            grace_period_seconds: 3.0,
            time_budget_seconds: 30.0,
            touchdown_threshold: 0.05,
            support_move_threshold: 0.05,
        }
    }
}

impl Default for StabilityWeights {
    fn default() -> Self {
        Self {
            sway_std: 0.3,
            sway_velocity: 0.3,
            arm_angle: 0.2,
            corrections: 0.2,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            cm_per_unit: 150.0,
            correction_threshold_cm: 3.0,
            sway_std_ceiling_cm: 5.0,
            sway_velocity_ceiling: 20.0,
            arm_angle_ceiling_deg: 45.0,
            corrections_ceiling: 10.0,
            weights: StabilityWeights::default(),
            duration_tiers: [10.0, 15.0, 20.0, 25.0],
            asymmetry_sentinel: 999.0,
        }
    }
}

impl Default for BilateralConfig {
    fn default() -> Self {
        Self {
            balanced_threshold_pct: 20.0,
            duration_weight: 0.5,
            sway_weight: 0.3,
            arm_weight: 0.1,
            corrections_weight: 0.1,
            arm_angle_ceiling_deg: 15.0,
            corrections_ceiling: 5.0,
        }
    }
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            step_threshold: 0.05,
            trend_threshold: 0.10,
            significant_threshold: 0.25,
            recent_window: 3,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_clip_seconds: 5.0,
            max_clip_seconds: 40.0,
            min_detection_ratio: 0.5,
            duration_mismatch_warn_seconds: 2.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
