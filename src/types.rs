// src/types.rs

use serde::{Deserialize, Serialize};
use std::ops::Index;

use crate::landmarks::{self, NUM_LANDMARKS};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub video: VideoConfig,
    pub pose: PoseConfig,
    pub filter: FilterConfig,
    pub detector: DetectorConfig,
    pub metrics: MetricsConfig,
    pub bilateral: BilateralConfig,
    pub trend: TrendConfig,
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Sampling rate frames are decimated to; also the rate timestamps are synthesized at
    pub target_fps: u32,
    /// Extraction stops once a frame's timestamp exceeds this
    pub safety_cutoff_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    pub model_path: String,
    /// Square side of the model input tensor
    pub input_size: usize,
    pub num_threads: usize,
    /// Pose presence score below this is reported as "no detection"
    pub min_presence: f32,
    /// Tracked region side = skeleton extent * this
    pub roi_expansion: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub cutoff_hz: f64,
    /// Upper bound on reflective padding per edge
    pub max_pad: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub grace_period_seconds: f64,
    pub time_budget_seconds: f64,
    /// Raised/support ankle vertical gap (fraction of frame height)
    pub touchdown_threshold: f32,
    /// Support ankle displacement (fraction of frame width)
    pub support_move_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Centimeters represented by one normalized frame unit
    pub cm_per_unit: f64,
    pub correction_threshold_cm: f64,
    pub sway_std_ceiling_cm: f64,
    pub sway_velocity_ceiling: f64,
    pub arm_angle_ceiling_deg: f64,
    pub corrections_ceiling: f64,
    pub weights: StabilityWeights,
    /// Lower bounds (seconds) of duration scores 2, 3, 4 and 5
    pub duration_tiers: [f64; 4],
    /// Reported asymmetry ratio when only the right arm average is zero
    pub asymmetry_sentinel: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityWeights {
    pub sway_std: f64,
    pub sway_velocity: f64,
    pub arm_angle: f64,
    pub corrections: f64,
}

impl StabilityWeights {
    pub fn total(&self) -> f64 {
        self.sway_std + self.sway_velocity + self.arm_angle + self.corrections
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BilateralConfig {
    pub balanced_threshold_pct: f64,
    pub duration_weight: f64,
    pub sway_weight: f64,
    pub arm_weight: f64,
    pub corrections_weight: f64,
    pub arm_angle_ceiling_deg: f64,
    pub corrections_ceiling: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Relative step change that counts as up/down
    pub step_threshold: f64,
    /// Relative change that leaves the stable band
    pub trend_threshold: f64,
    /// Relative change that makes a trend significant
    pub significant_threshold: f64,
    /// Number of most recent records compared against the rest
    pub recent_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_clip_seconds: f64,
    pub max_clip_seconds: f64,
    pub min_detection_ratio: f64,
    pub duration_mismatch_warn_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

// ============================================================================
// LEGS & OUTCOMES
// ============================================================================

/// The standing (support) leg of a single-leg test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Left,
    Right,
}

impl Leg {
    pub fn support_ankle(self) -> usize {
        match self {
            Leg::Left => landmarks::LEFT_ANKLE,
            Leg::Right => landmarks::RIGHT_ANKLE,
        }
    }

    pub fn raised_ankle(self) -> usize {
        match self {
            Leg::Left => landmarks::RIGHT_ANKLE,
            Leg::Right => landmarks::LEFT_ANKLE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Leg::Left => "left",
            Leg::Right => "right",
        }
    }
}

impl std::str::FromStr for Leg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Leg::Left),
            "right" => Ok(Leg::Right),
            other => Err(format!("unknown leg '{}', expected left or right", other)),
        }
    }
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Held for the whole time budget
    TimeComplete,
    /// Raised foot came down next to the support foot
    FootTouchdown,
    /// Support foot shifted from where it was planted
    SupportFootMoved,
}

impl FailureReason {
    pub fn is_success(self) -> bool {
        self == FailureReason::TimeComplete
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::TimeComplete => "time_complete",
            FailureReason::FootTouchdown => "foot_touchdown",
            FailureReason::SupportFootMoved => "support_foot_moved",
        };
        f.write_str(s)
    }
}

// ============================================================================
// FRAMES & KEYPOINTS
// ============================================================================

/// Decoded RGB image, 3 bytes per pixel, row-major
#[derive(Debug, Clone)]
pub struct RgbFrame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

/// A decoded frame together with its synthesized test-relative timestamp
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub image: RgbFrame,
    pub timestamp_ms: u64,
}

impl SampledFrame {
    pub fn timestamp_seconds(&self) -> f64 {
        self.timestamp_ms as f64 / 1000.0
    }
}

/// One body landmark. x/y normalized to the frame (origin top-left, y down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }
}

/// A complete 33-landmark body skeleton. Partial detections do not exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Keypoint>", into = "Vec<Keypoint>")]
pub struct Skeleton {
    points: Vec<Keypoint>,
}

impl Skeleton {
    /// Returns `None` unless exactly 33 keypoints are supplied
    pub fn new(points: Vec<Keypoint>) -> Option<Self> {
        (points.len() == NUM_LANDMARKS).then_some(Self { points })
    }

    pub fn points(&self) -> &[Keypoint] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [Keypoint] {
        &mut self.points
    }

    /// Midpoint of the two hip landmarks, the center-of-mass proxy
    pub fn hip_center(&self) -> (f64, f64) {
        let l = self.points[landmarks::LEFT_HIP];
        let r = self.points[landmarks::RIGHT_HIP];
        (
            (l.x as f64 + r.x as f64) / 2.0,
            (l.y as f64 + r.y as f64) / 2.0,
        )
    }
}

impl Index<usize> for Skeleton {
    type Output = Keypoint;

    fn index(&self, idx: usize) -> &Keypoint {
        &self.points[idx]
    }
}

impl TryFrom<Vec<Keypoint>> for Skeleton {
    type Error = String;

    fn try_from(points: Vec<Keypoint>) -> Result<Self, Self::Error> {
        let len = points.len();
        Skeleton::new(points)
            .ok_or_else(|| format!("expected {} keypoints, got {}", NUM_LANDMARKS, len))
    }
}

impl From<Skeleton> for Vec<Keypoint> {
    fn from(s: Skeleton) -> Self {
        s.points
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Standing-on-left-leg T-pose: arms level with shoulders, right ankle raised
    pub fn t_pose() -> Skeleton {
        let mut pts = vec![Keypoint::new(0.5, 0.5, 0.0, 0.99); NUM_LANDMARKS];
        pts[landmarks::LEFT_SHOULDER] = Keypoint::new(0.45, 0.30, 0.0, 0.99);
        pts[landmarks::RIGHT_SHOULDER] = Keypoint::new(0.55, 0.30, 0.0, 0.99);
        pts[landmarks::LEFT_WRIST] = Keypoint::new(0.30, 0.30, 0.0, 0.99);
        pts[landmarks::RIGHT_WRIST] = Keypoint::new(0.70, 0.30, 0.0, 0.99);
        pts[landmarks::LEFT_HIP] = Keypoint::new(0.47, 0.55, 0.0, 0.99);
        pts[landmarks::RIGHT_HIP] = Keypoint::new(0.53, 0.55, 0.0, 0.99);
        pts[landmarks::LEFT_ANKLE] = Keypoint::new(0.47, 0.90, 0.0, 0.99);
        pts[landmarks::RIGHT_ANKLE] = Keypoint::new(0.55, 0.75, 0.0, 0.99);
        Skeleton::new(pts).unwrap()
    }

    pub fn with_point(mut s: Skeleton, idx: usize, x: f32, y: f32) -> Skeleton {
        s.points_mut()[idx].x = x;
        s.points_mut()[idx].y = y;
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skeleton_requires_33_points() {
        assert!(Skeleton::new(vec![Keypoint::default(); 32]).is_none());
        assert!(Skeleton::new(vec![Keypoint::default(); 33]).is_some());
    }

    #[test]
    fn test_skeleton_serde_rejects_partial() {
        let json = serde_json::to_string(&vec![Keypoint::default(); 5]).unwrap();
        assert!(serde_json::from_str::<Skeleton>(&json).is_err());
    }

    #[test]
    fn test_leg_ankles() {
        assert_eq!(Leg::Left.support_ankle(), landmarks::LEFT_ANKLE);
        assert_eq!(Leg::Left.raised_ankle(), landmarks::RIGHT_ANKLE);
        assert_eq!("RIGHT".parse::<Leg>().unwrap(), Leg::Right);
        assert!("middle".parse::<Leg>().is_err());
    }

    #[test]
    fn test_failure_reason_serializes_snake_case() {
        let s = serde_json::to_string(&FailureReason::SupportFootMoved).unwrap();
        assert_eq!(s, "\"support_foot_moved\"");
        assert!(FailureReason::TimeComplete.is_success());
        assert!(!FailureReason::FootTouchdown.is_success());
    }
}
