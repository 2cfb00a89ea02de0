// src/preprocessing.rs

use crate::types::RgbFrame;

/// Square crop region in source pixel coordinates. May extend past the
/// image borders; pixels outside are filled with black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub center_x: f32,
    pub center_y: f32,
    pub size: f32,
}

impl Roi {
    /// Whole frame, letterboxed to a square
    pub fn full_frame(width: usize, height: usize) -> Self {
        Self {
            center_x: width as f32 / 2.0,
            center_y: height as f32 / 2.0,
            size: width.max(height) as f32,
        }
    }

    pub fn left(&self) -> f32 {
        self.center_x - self.size / 2.0
    }

    pub fn top(&self) -> f32 {
        self.center_y - self.size / 2.0
    }

    /// Maps a point from model-input pixels back to frame-normalized coordinates
    pub fn to_frame_normalized(
        &self,
        x: f32,
        y: f32,
        input_size: usize,
        frame_w: usize,
        frame_h: usize,
    ) -> (f32, f32) {
        let scale = self.size / input_size as f32;
        let px = self.left() + x * scale;
        let py = self.top() + y * scale;
        (px / frame_w as f32, py / frame_h as f32)
    }
}

/// Crop `roi`, resize to `dst_size` x `dst_size`, scale to [0, 1], NHWC layout
pub fn preprocess(frame: &RgbFrame, roi: &Roi, dst_size: usize) -> Vec<f32> {
    let mut output = vec![0.0f32; dst_size * dst_size * 3];
    if frame.width == 0 || frame.height == 0 || dst_size == 0 {
        return output;
    }

    let scale = roi.size / dst_size as f32;
    let left = roi.left();
    let top = roi.top();

    for dy in 0..dst_size {
        for dx in 0..dst_size {
            let sx = left + (dx as f32 + 0.5) * scale - 0.5;
            let sy = top + (dy as f32 + 0.5) * scale - 0.5;
            let dst_idx = (dy * dst_size + dx) * 3;

            if let Some(px) = sample_bilinear(frame, sx, sy) {
                for c in 0..3 {
                    output[dst_idx + c] = px[c] / 255.0;
                }
            }
        }
    }

    output
}

/// Bilinear sample at a fractional pixel position, `None` outside the image
fn sample_bilinear(frame: &RgbFrame, sx: f32, sy: f32) -> Option<[f32; 3]> {
    let (w, h) = (frame.width, frame.height);
    if sx < -0.5 || sy < -0.5 || sx > w as f32 - 0.5 || sy > h as f32 - 0.5 {
        return None;
    }

    let sx = sx.clamp(0.0, (w - 1) as f32);
    let sy = sy.clamp(0.0, (h - 1) as f32);

    let sx0 = sx.floor() as usize;
    let sy0 = sy.floor() as usize;
    let sx1 = (sx0 + 1).min(w - 1);
    let sy1 = (sy0 + 1).min(h - 1);

    let fx = sx - sx0 as f32;
    let fy = sy - sy0 as f32;

    let src = &frame.data;
    let mut out = [0.0f32; 3];
    for (c, v) in out.iter_mut().enumerate() {
        let p00 = src[(sy0 * w + sx0) * 3 + c] as f32;
        let p10 = src[(sy0 * w + sx1) * 3 + c] as f32;
        let p01 = src[(sy1 * w + sx0) * 3 + c] as f32;
        let p11 = src[(sy1 * w + sx1) * 3 + c] as f32;

        *v = p00 * (1.0 - fx) * (1.0 - fy)
            + p10 * fx * (1.0 - fy)
            + p01 * (1.0 - fx) * fy
            + p11 * fx * fy;
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: usize, height: usize, value: u8) -> RgbFrame {
        RgbFrame {
            data: vec![value; width * height * 3],
            width,
            height,
        }
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let frame = solid(64, 48, 255);
        let roi = Roi::full_frame(64, 48);
        let out = preprocess(&frame, &roi, 32);
        assert_eq!(out.len(), 32 * 32 * 3);
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_letterbox_pads_outside_with_black() {
        // Wide frame: top and bottom rows of the square input fall outside
        let frame = solid(100, 50, 255);
        let roi = Roi::full_frame(100, 50);
        let out = preprocess(&frame, &roi, 20);
        assert_eq!(out[0], 0.0);
        let mid = (10 * 20 + 10) * 3;
        assert!((out[mid] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_roi_mapping_round_trip_center() {
        let roi = Roi::full_frame(640, 480);
        let (x, y) = roi.to_frame_normalized(128.0, 128.0, 256, 640, 480);
        assert!((x - 0.5).abs() < 1e-6);
        assert!((y - 0.5).abs() < 1e-6);
    }
}
