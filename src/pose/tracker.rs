// src/pose/tracker.rs
//
// Region-of-interest tracking between consecutive frames: the next crop is
// derived from the previous skeleton, so frames must arrive in order.

use crate::preprocessing::Roi;
use crate::types::Skeleton;
use tracing::debug;

/// Keypoints below this visibility do not shape the next crop
const MIN_TRACKING_VISIBILITY: f32 = 0.3;

/// Smallest crop side in pixels, unless the frame itself is smaller
const MIN_ROI_SIZE: f32 = 16.0;

#[derive(Debug, Clone)]
pub struct RoiTracker {
    expansion: f32,
    frame_w: usize,
    frame_h: usize,
    current: Option<Roi>,
}

impl RoiTracker {
    pub fn new(expansion: f32) -> Self {
        Self {
            expansion,
            frame_w: 0,
            frame_h: 0,
            current: None,
        }
    }

    /// Crop to use for the next frame of the given size
    pub fn roi_for(&mut self, frame_w: usize, frame_h: usize) -> Roi {
        if frame_w != self.frame_w || frame_h != self.frame_h {
            self.frame_w = frame_w;
            self.frame_h = frame_h;
            self.current = None;
        }
        self.current
            .unwrap_or_else(|| Roi::full_frame(frame_w, frame_h))
    }

    pub fn is_tracking(&self) -> bool {
        self.current.is_some()
    }

    /// Feed back this frame's result
    pub fn update(&mut self, skeleton: Option<&Skeleton>) {
        let Some(skeleton) = skeleton else {
            if self.current.take().is_some() {
                debug!("Pose lost, falling back to full-frame search");
            }
            return;
        };

        if self.frame_w == 0 || self.frame_h == 0 {
            self.current = None;
            return;
        }

        let (w, h) = (self.frame_w as f32, self.frame_h as f32);
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        let mut used = 0;

        for kp in skeleton.points() {
            if kp.visibility < MIN_TRACKING_VISIBILITY {
                continue;
            }
            let (px, py) = (kp.x * w, kp.y * h);
            min_x = min_x.min(px);
            min_y = min_y.min(py);
            max_x = max_x.max(px);
            max_y = max_y.max(py);
            used += 1;
        }

        if used < 2 {
            self.current = None;
            return;
        }

        let extent = (max_x - min_x).max(max_y - min_y);
        let full = Roi::full_frame(self.frame_w, self.frame_h);
        let size = (extent * self.expansion).max(MIN_ROI_SIZE).min(full.size);

        self.current = Some(Roi {
            center_x: (min_x + max_x) / 2.0,
            center_y: (min_y + max_y) / 2.0,
            size,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::t_pose;

    #[test]
    fn test_starts_with_full_frame() {
        let mut tracker = RoiTracker::new(1.5);
        assert_eq!(tracker.roi_for(640, 480), Roi::full_frame(640, 480));
        assert!(!tracker.is_tracking());
    }

    #[test]
    fn test_follows_skeleton_and_resets_on_loss() {
        let mut tracker = RoiTracker::new(1.5);
        tracker.roi_for(1000, 1000);
        tracker.update(Some(&t_pose()));
        assert!(tracker.is_tracking());

        let roi = tracker.roi_for(1000, 1000);
        assert!(roi.size < 1000.0);
        assert!((roi.center_x - 500.0).abs() < 50.0);

        tracker.update(None);
        assert_eq!(tracker.roi_for(1000, 1000), Roi::full_frame(1000, 1000));
    }

    #[test]
    fn test_tiny_frame_does_not_panic() {
        let mut tracker = RoiTracker::new(1.5);
        tracker.roi_for(12, 10);
        tracker.update(Some(&t_pose()));
        let roi = tracker.roi_for(12, 10);
        assert!(roi.size <= 12.0);
        assert!(roi.size > 0.0);
    }

    #[test]
    fn test_update_before_any_frame_is_ignored() {
        let mut tracker = RoiTracker::new(1.5);
        tracker.update(Some(&t_pose()));
        assert!(!tracker.is_tracking());
        assert_eq!(tracker.roi_for(640, 480), Roi::full_frame(640, 480));
    }

    #[test]
    fn test_frame_size_change_resets() {
        let mut tracker = RoiTracker::new(1.5);
        tracker.roi_for(1000, 1000);
        tracker.update(Some(&t_pose()));
        assert_eq!(tracker.roi_for(640, 480), Roi::full_frame(640, 480));
    }
}
