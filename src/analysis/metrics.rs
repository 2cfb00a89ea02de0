// src/analysis/metrics.rs
//
// Reduces a filtered pose sequence to the per-leg metrics record.
// Total: an empty sequence yields a well-defined zero record.

use super::scoring::DurationScore;
use crate::landmarks::{LEFT_SHOULDER, LEFT_WRIST, RIGHT_SHOULDER, RIGHT_WRIST};
use crate::types::{FailureReason, MetricsConfig, Skeleton};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const METRICS_SCHEMA_VERSION: u32 = 1;

/// Durable result of one leg's test. Lengths in cm, velocities in cm/s,
/// angles in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub schema_version: u32,
    /// In-test time of the last analysed frame (s)
    pub hold_time_seconds: f64,
    pub success: bool,
    pub failure_reason: FailureReason,
    /// Std-dev of the hip midpoint, horizontal (cm)
    pub sway_std_x: f64,
    /// Std-dev of the hip midpoint, vertical (cm)
    pub sway_std_y: f64,
    /// Distance travelled by the hip midpoint (cm)
    pub sway_path_length: f64,
    /// Path length over hold time (cm/s)
    pub sway_velocity: f64,
    /// Mean wrist angle below the shoulder line (deg, positive = dropped)
    pub arm_angle_left: f64,
    pub arm_angle_right: f64,
    /// |left| / |right|
    pub arm_asymmetry_ratio: f64,
    pub corrections_count: u32,
    /// Composite 0..=100, higher is steadier
    pub stability_score: f64,
    pub duration_score: DurationScore,
}

impl MetricsRecord {
    /// Record for a test with no usable frames
    pub fn empty(failure_reason: FailureReason) -> Self {
        Self {
            schema_version: METRICS_SCHEMA_VERSION,
            hold_time_seconds: 0.0,
            success: false,
            failure_reason,
            sway_std_x: 0.0,
            sway_std_y: 0.0,
            sway_path_length: 0.0,
            sway_velocity: 0.0,
            arm_angle_left: 0.0,
            arm_angle_right: 0.0,
            arm_asymmetry_ratio: 1.0,
            corrections_count: 0,
            stability_score: 0.0,
            duration_score: DurationScore::MIN,
        }
    }
}

pub struct MetricsCalculator {
    config: MetricsConfig,
    /// Frame width / height, converts normalized x into y units for angles
    aspect_ratio: f64,
}

impl MetricsCalculator {
    pub fn new(config: MetricsConfig, frame_width: usize, frame_height: usize) -> Self {
        let aspect_ratio = if frame_width > 0 && frame_height > 0 {
            frame_width as f64 / frame_height as f64
        } else {
            1.0
        };
        Self {
            config,
            aspect_ratio,
        }
    }

    /// `frames` and `timestamps` are parallel; timestamps in seconds
    pub fn compute(
        &self,
        frames: &[Skeleton],
        timestamps: &[f64],
        failure_reason: FailureReason,
    ) -> MetricsRecord {
        if frames.is_empty() {
            return MetricsRecord::empty(failure_reason);
        }

        let hold_time = timestamps.last().copied().unwrap_or(0.0).max(0.0);
        let scale = self.config.cm_per_unit;

        let trajectory: Vec<(f64, f64)> = frames
            .iter()
            .map(|f| {
                let (x, y) = f.hip_center();
                (x * scale, y * scale)
            })
            .collect();

        let xs: Vec<f64> = trajectory.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = trajectory.iter().map(|p| p.1).collect();

        let sway_std_x = std_dev(&xs);
        let sway_std_y = std_dev(&ys);
        let sway_path_length = path_length(&trajectory);
        let sway_velocity = if hold_time > 0.0 {
            sway_path_length / hold_time
        } else {
            0.0
        };

        let (arm_angle_left, arm_angle_right) = self.arm_angles(frames);
        let arm_asymmetry_ratio = asymmetry_ratio(
            arm_angle_left,
            arm_angle_right,
            self.config.asymmetry_sentinel,
        );

        let corrections_count = count_corrections(&xs, self.config.correction_threshold_cm);

        let stability_score = self.stability_score(
            sway_std_x + sway_std_y,
            sway_velocity,
            (arm_angle_left.abs() + arm_angle_right.abs()) / 2.0,
            corrections_count,
        );

        let duration_score = DurationScore::from_hold_time(hold_time, &self.config.duration_tiers);

        debug!(
            "Metrics: hold {:.2}s, sway {:.2}/{:.2} cm, path {:.1} cm, {} corrections, stability {:.1}",
            hold_time, sway_std_x, sway_std_y, sway_path_length, corrections_count, stability_score
        );

        MetricsRecord {
            schema_version: METRICS_SCHEMA_VERSION,
            hold_time_seconds: hold_time,
            success: failure_reason.is_success(),
            failure_reason,
            sway_std_x,
            sway_std_y,
            sway_path_length,
            sway_velocity,
            arm_angle_left,
            arm_angle_right,
            arm_asymmetry_ratio,
            corrections_count,
            stability_score,
            duration_score,
        }
    }

    /// Mean signed angle of each wrist below its shoulder's horizontal
    fn arm_angles(&self, frames: &[Skeleton]) -> (f64, f64) {
        let angle = |f: &Skeleton, shoulder: usize, wrist: usize| {
            let s = f[shoulder];
            let w = f[wrist];
            let dy = (w.y - s.y) as f64;
            let dx = (w.x - s.x).abs() as f64 * self.aspect_ratio;
            dy.atan2(dx).to_degrees()
        };

        let n = frames.len() as f64;
        let left: f64 = frames
            .iter()
            .map(|f| angle(f, LEFT_SHOULDER, LEFT_WRIST))
            .sum();
        let right: f64 = frames
            .iter()
            .map(|f| angle(f, RIGHT_SHOULDER, RIGHT_WRIST))
            .sum();

        (left / n, right / n)
    }

    fn stability_score(
        &self,
        sway_std: f64,
        sway_velocity: f64,
        arm_angle: f64,
        corrections: u32,
    ) -> f64 {
        let c = &self.config;
        let w = &c.weights;

        let weighted = w.sway_std * normalized(sway_std, c.sway_std_ceiling_cm)
            + w.sway_velocity * normalized(sway_velocity, c.sway_velocity_ceiling)
            + w.arm_angle * normalized(arm_angle, c.arm_angle_ceiling_deg)
            + w.corrections * normalized(corrections as f64, c.corrections_ceiling);

        ((1.0 - weighted) * 100.0).clamp(0.0, 100.0)
    }
}

fn normalized(value: f64, ceiling: f64) -> f64 {
    if ceiling <= 0.0 {
        return 1.0;
    }
    (value / ceiling).clamp(0.0, 1.0)
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

pub fn path_length(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| ((w[1].0 - w[0].0).powi(2) + (w[1].1 - w[0].1).powi(2)).sqrt())
        .sum()
}

pub fn asymmetry_ratio(left: f64, right: f64, sentinel: f64) -> f64 {
    let (l, r) = (left.abs(), right.abs());
    if r > 0.0 {
        l / r
    } else if l > 0.0 {
        sentinel
    } else {
        1.0
    }
}

/// Excursions past `threshold` from the mean that return inside the band.
/// An excursion still outside when the signal ends is not counted.
pub fn count_corrections(values: &[f64], threshold: f64) -> u32 {
    if values.is_empty() {
        return 0;
    }
    let center = values.iter().sum::<f64>() / values.len() as f64;

    let mut corrections = 0;
    let mut outside = false;

    for v in values {
        let distance = (v - center).abs();
        if !outside && distance > threshold {
            outside = true;
        } else if outside && distance < threshold {
            corrections += 1;
            outside = false;
        }
    }

    corrections
}
