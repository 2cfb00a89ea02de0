// src/analysis/bilateral.rs
//
// Left/right symmetry of a dual-leg assessment. Pure function of the two
// records; every magnitude is invariant under swapping the legs.

use super::metrics::MetricsRecord;
use crate::types::BilateralConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DominantLeg {
    Left,
    Right,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymmetryAssessment {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl SymmetryAssessment {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            SymmetryAssessment::Excellent
        } else if score >= 70.0 {
            SymmetryAssessment::Good
        } else if score >= 50.0 {
            SymmetryAssessment::Fair
        } else {
            SymmetryAssessment::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BilateralComparison {
    /// |left - right| hold time (s)
    pub duration_difference: f64,
    /// Difference relative to the longer hold (0..=100)
    pub duration_difference_pct: f64,
    pub dominant_leg: DominantLeg,
    /// |left - right| sway velocity (cm/s)
    pub sway_difference: f64,
    /// 1 = identical sway, 0 = differ by at least their mean
    pub sway_symmetry_score: f64,
    /// Difference of per-leg mean arm angles (deg)
    pub arm_angle_difference: f64,
    /// left - right
    pub corrections_difference: i64,
    pub overall_symmetry_score: f64,
    pub symmetry_assessment: SymmetryAssessment,
}

pub fn compare(
    left: &MetricsRecord,
    right: &MetricsRecord,
    config: &BilateralConfig,
) -> BilateralComparison {
    // Duration
    let (lh, rh) = (left.hold_time_seconds, right.hold_time_seconds);
    let duration_difference = (lh - rh).abs();
    let longest = lh.max(rh);
    let duration_difference_pct = if longest > 0.0 {
        duration_difference / longest * 100.0
    } else {
        0.0
    };

    let dominant_leg = if duration_difference_pct < config.balanced_threshold_pct {
        DominantLeg::Balanced
    } else if lh > rh {
        DominantLeg::Left
    } else {
        DominantLeg::Right
    };

    // Sway
    let sway_difference = (left.sway_velocity - right.sway_velocity).abs();
    let mean_sway = (left.sway_velocity + right.sway_velocity) / 2.0;
    let sway_symmetry_score = if mean_sway > 0.0 {
        1.0 - (sway_difference / mean_sway).min(1.0)
    } else {
        1.0
    };

    // Arms
    let left_arm = (left.arm_angle_left + left.arm_angle_right) / 2.0;
    let right_arm = (right.arm_angle_left + right.arm_angle_right) / 2.0;
    let arm_angle_difference = (left_arm - right_arm).abs();

    // Corrections
    let corrections_difference = left.corrections_count as i64 - right.corrections_count as i64;

    let duration_component = (100.0 - duration_difference_pct).max(0.0);
    let sway_component = (sway_symmetry_score * 100.0).max(0.0);
    let arm_component = (100.0 - arm_angle_difference / config.arm_angle_ceiling_deg * 100.0).max(0.0);
    let corrections_component = (100.0
        - corrections_difference.unsigned_abs() as f64 / config.corrections_ceiling * 100.0)
        .max(0.0);

    let overall_symmetry_score = (duration_component * config.duration_weight
        + sway_component * config.sway_weight
        + arm_component * config.arm_weight
        + corrections_component * config.corrections_weight)
        .clamp(0.0, 100.0);

    BilateralComparison {
        duration_difference,
        duration_difference_pct,
        dominant_leg,
        sway_difference,
        sway_symmetry_score,
        arm_angle_difference,
        corrections_difference,
        overall_symmetry_score,
        symmetry_assessment: SymmetryAssessment::from_score(overall_symmetry_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureReason;

    fn record(hold: f64, sway_velocity: f64, arm: f64, corrections: u32) -> MetricsRecord {
        MetricsRecord {
            hold_time_seconds: hold,
            sway_velocity,
            arm_angle_left: arm,
            arm_angle_right: arm,
            corrections_count: corrections,
            success: true,
            ..MetricsRecord::empty(FailureReason::TimeComplete)
        }
    }

    fn cfg() -> BilateralConfig {
        BilateralConfig::default()
    }

    #[test]
    fn test_reference_scenario() {
        let left = record(25.3, 2.1, 10.0, 5);
        let right = record(23.8, 2.3, 2.5, 2);
        let cmp = compare(&left, &right, &cfg());

        assert!((cmp.duration_difference - 1.5).abs() < 1e-9);
        assert!((cmp.duration_difference_pct - 5.93).abs() < 0.01);
        assert_eq!(cmp.dominant_leg, DominantLeg::Balanced);
        assert!((cmp.sway_symmetry_score - (1.0 - 0.2 / 2.2)).abs() < 1e-9);
        assert!((cmp.arm_angle_difference - 7.5).abs() < 1e-9);
        assert_eq!(cmp.corrections_difference, 3);
        assert!(
            (80.0..90.0).contains(&cmp.overall_symmetry_score),
            "score {}",
            cmp.overall_symmetry_score
        );
        assert_eq!(cmp.symmetry_assessment, SymmetryAssessment::Good);
    }

    #[test]
    fn test_dominance_boundary_is_exclusive() {
        // Exactly 20% apart: not balanced
        let cmp = compare(&record(20.0, 1.0, 0.0, 0), &record(16.0, 1.0, 0.0, 0), &cfg());
        assert!((cmp.duration_difference_pct - 20.0).abs() < 1e-9);
        assert_eq!(cmp.dominant_leg, DominantLeg::Left);

        let cmp = compare(&record(16.1, 1.0, 0.0, 0), &record(20.0, 1.0, 0.0, 0), &cfg());
        assert_eq!(cmp.dominant_leg, DominantLeg::Balanced);

        let cmp = compare(&record(10.0, 1.0, 0.0, 0), &record(20.0, 1.0, 0.0, 0), &cfg());
        assert_eq!(cmp.dominant_leg, DominantLeg::Right);
    }

    #[test]
    fn test_swap_invariance() {
        let a = record(18.2, 3.4, 12.0, 7);
        let b = record(27.9, 1.1, -4.0, 1);
        let ab = compare(&a, &b, &cfg());
        let ba = compare(&b, &a, &cfg());

        assert_eq!(ab.overall_symmetry_score, ba.overall_symmetry_score);
        assert_eq!(ab.duration_difference_pct, ba.duration_difference_pct);
        assert_eq!(ab.sway_symmetry_score, ba.sway_symmetry_score);
        assert_eq!(ab.arm_angle_difference, ba.arm_angle_difference);
        assert_eq!(ab.corrections_difference, -ba.corrections_difference);
        assert_eq!(ab.symmetry_assessment, ba.symmetry_assessment);
        assert_eq!(ab.dominant_leg, DominantLeg::Right);
        assert_eq!(ba.dominant_leg, DominantLeg::Left);
    }

    #[test]
    fn test_zero_records() {
        let z = MetricsRecord::empty(FailureReason::FootTouchdown);
        let cmp = compare(&z, &z, &cfg());
        assert_eq!(cmp.duration_difference_pct, 0.0);
        assert_eq!(cmp.dominant_leg, DominantLeg::Balanced);
        assert_eq!(cmp.sway_symmetry_score, 1.0);
        assert_eq!(cmp.overall_symmetry_score, 100.0);
        assert_eq!(cmp.symmetry_assessment, SymmetryAssessment::Excellent);
    }

    #[test]
    fn test_components_floor_at_zero() {
        let cmp = compare(&record(30.0, 10.0, 40.0, 12), &record(1.0, 0.1, 0.0, 0), &cfg());
        assert_eq!(cmp.sway_symmetry_score, 0.0);
        assert!(cmp.overall_symmetry_score >= 0.0);
        assert!(cmp.overall_symmetry_score < 5.0);
        assert_eq!(cmp.symmetry_assessment, SymmetryAssessment::Poor);
    }

    #[test]
    fn test_assessment_bands() {
        assert_eq!(SymmetryAssessment::from_score(85.0), SymmetryAssessment::Excellent);
        assert_eq!(SymmetryAssessment::from_score(84.9), SymmetryAssessment::Good);
        assert_eq!(SymmetryAssessment::from_score(70.0), SymmetryAssessment::Good);
        assert_eq!(SymmetryAssessment::from_score(50.0), SymmetryAssessment::Fair);
        assert_eq!(SymmetryAssessment::from_score(49.9), SymmetryAssessment::Poor);
    }
}
