// src/failure_detector.rs
//
// Online monitor for test-ending conditions:
//
//   WARMUP ──(elapsed >= grace)──▶ MONITORING ──▶ FAILED(reason)
//
// The support ankle's position at the WARMUP→MONITORING transition is the
// reference for foot-movement checks.

use crate::types::{DetectorConfig, FailureReason, Leg, Skeleton};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorState {
    Warmup,
    Monitoring { reference: (f32, f32) },
    Failed(FailureReason),
}

impl DetectorState {
    pub fn name(&self) -> &'static str {
        match self {
            DetectorState::Warmup => "WARMUP",
            DetectorState::Monitoring { .. } => "MONITORING",
            DetectorState::Failed(_) => "FAILED",
        }
    }
}

pub struct FailureDetector {
    config: DetectorConfig,
    support_ankle: usize,
    raised_ankle: usize,
    state: DetectorState,
    failed_at: Option<f64>,
}

impl FailureDetector {
    /// `leg` is the standing leg
    pub fn new(config: DetectorConfig, leg: Leg) -> Self {
        Self {
            config,
            support_ankle: leg.support_ankle(),
            raised_ankle: leg.raised_ankle(),
            state: DetectorState::Warmup,
            failed_at: None,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, DetectorState::Failed(_))
    }

    /// Timestamp of the frame that ended the test, if any
    pub fn failed_at(&self) -> Option<f64> {
        self.failed_at
    }

    /// Terminal reason, defaulting to a completed hold when the stream ran out
    pub fn outcome(&self) -> FailureReason {
        match self.state {
            DetectorState::Failed(reason) => reason,
            _ => FailureReason::TimeComplete,
        }
    }

    /// Evaluates one frame with a detected pose. Returns the reason on the
    /// frame that ends the test; later calls are ignored.
    pub fn observe(&mut self, skeleton: &Skeleton, elapsed_seconds: f64) -> Option<FailureReason> {
        match self.state {
            DetectorState::Failed(_) => None,

            DetectorState::Warmup => {
                if elapsed_seconds < self.config.grace_period_seconds {
                    return None;
                }
                let ankle = skeleton[self.support_ankle];
                self.state = DetectorState::Monitoring {
                    reference: (ankle.x, ankle.y),
                };
                info!(
                    "Monitoring from {:.2}s, support ankle at ({:.3}, {:.3})",
                    elapsed_seconds, ankle.x, ankle.y
                );
                self.evaluate(skeleton, elapsed_seconds, (ankle.x, ankle.y))
            }

            DetectorState::Monitoring { reference } => {
                self.evaluate(skeleton, elapsed_seconds, reference)
            }
        }
    }

    fn evaluate(
        &mut self,
        skeleton: &Skeleton,
        elapsed_seconds: f64,
        reference: (f32, f32),
    ) -> Option<FailureReason> {
        let support = skeleton[self.support_ankle];
        let raised = skeleton[self.raised_ankle];

        let reason = if (raised.y - support.y).abs() < self.config.touchdown_threshold {
            Some(FailureReason::FootTouchdown)
        } else if distance((support.x, support.y), reference) > self.config.support_move_threshold
        {
            Some(FailureReason::SupportFootMoved)
        } else if elapsed_seconds >= self.config.time_budget_seconds {
            Some(FailureReason::TimeComplete)
        } else {
            None
        };

        if let Some(reason) = reason {
            self.state = DetectorState::Failed(reason);
            self.failed_at = Some(elapsed_seconds);
            if reason.is_success() {
                info!("✓ Hold completed at {:.2}s", elapsed_seconds);
            } else {
                info!("Test ended at {:.2}s: {}", elapsed_seconds, reason);
            }
        } else {
            debug!(
                "t={:.2}s ankle gap {:.3}",
                elapsed_seconds,
                (raised.y - support.y).abs()
            );
        }
        reason
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{LEFT_ANKLE, RIGHT_ANKLE};
    use crate::types::test_support::{t_pose, with_point};

    fn detector() -> FailureDetector {
        FailureDetector::new(DetectorConfig::default(), Leg::Left)
    }

    /// Raised foot down on the floor, support foot far from where it started
    fn collapsed() -> Skeleton {
        let s = with_point(t_pose(), RIGHT_ANKLE, 0.55, 0.90);
        with_point(s, LEFT_ANKLE, 0.20, 0.90)
    }

    #[test]
    fn test_stays_in_warmup_during_grace_period() {
        let mut det = detector();
        for i in 0..90 {
            let t = i as f64 / 30.0;
            assert_eq!(det.observe(&collapsed(), t), None);
            assert_eq!(det.state(), DetectorState::Warmup);
        }
    }

    #[test]
    fn test_reference_recorded_at_transition() {
        let mut det = detector();
        det.observe(&t_pose(), 1.0);
        assert_eq!(det.observe(&t_pose(), 3.0), None);
        match det.state() {
            DetectorState::Monitoring { reference } => {
                assert_eq!(reference, (0.47, 0.90));
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_foot_touchdown() {
        let mut det = detector();
        det.observe(&t_pose(), 3.0);
        let touched = with_point(t_pose(), RIGHT_ANKLE, 0.55, 0.88);
        assert_eq!(det.observe(&touched, 5.0), Some(FailureReason::FootTouchdown));
        assert_eq!(det.state(), DetectorState::Failed(FailureReason::FootTouchdown));
        assert_eq!(det.failed_at(), Some(5.0));
    }

    #[test]
    fn test_support_foot_moved() {
        let mut det = detector();
        det.observe(&t_pose(), 3.0);
        let small = with_point(t_pose(), LEFT_ANKLE, 0.49, 0.90);
        assert_eq!(det.observe(&small, 4.0), None);
        let shifted = with_point(t_pose(), LEFT_ANKLE, 0.55, 0.90);
        assert_eq!(
            det.observe(&shifted, 4.5),
            Some(FailureReason::SupportFootMoved)
        );
    }

    #[test]
    fn test_touchdown_wins_over_movement_on_same_frame() {
        let mut det = detector();
        det.observe(&t_pose(), 3.0);
        assert_eq!(
            det.observe(&collapsed(), 6.0),
            Some(FailureReason::FootTouchdown)
        );
    }

    #[test]
    fn test_time_budget_completes() {
        let mut det = detector();
        let mut ended = None;
        for i in 0..=31 * 30 {
            let t = i as f64 / 30.0;
            if let Some(r) = det.observe(&t_pose(), t) {
                ended = Some((r, t));
                break;
            }
        }
        let (reason, t) = ended.unwrap();
        assert_eq!(reason, FailureReason::TimeComplete);
        assert!(reason.is_success());
        assert!((t - 30.0).abs() < 1.0 / 30.0 + 1e-9);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let mut det = detector();
        det.observe(&t_pose(), 3.0);
        det.observe(&collapsed(), 4.0);
        assert_eq!(det.observe(&t_pose(), 5.0), None);
        assert_eq!(det.outcome(), FailureReason::FootTouchdown);
    }

    #[test]
    fn test_stream_end_defaults_to_time_complete() {
        let mut det = detector();
        det.observe(&t_pose(), 3.5);
        assert!(!det.is_terminal());
        assert_eq!(det.outcome(), FailureReason::TimeComplete);
    }

    #[test]
    fn test_right_leg_uses_right_ankle_as_support() {
        let mut det = FailureDetector::new(DetectorConfig::default(), Leg::Right);
        // Standing on right: right ankle on floor, left ankle raised
        let pose = with_point(t_pose(), RIGHT_ANKLE, 0.53, 0.90);
        let pose = with_point(pose, LEFT_ANKLE, 0.45, 0.75);
        det.observe(&pose, 3.0);
        assert!(matches!(det.state(), DetectorState::Monitoring { .. }));
        let moved = with_point(pose, RIGHT_ANKLE, 0.60, 0.90);
        assert_eq!(det.observe(&moved, 4.0), Some(FailureReason::SupportFootMoved));
    }
}
