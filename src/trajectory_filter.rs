// src/trajectory_filter.rs
//
// Zero-phase low-pass smoothing of keypoint trajectories: a second-order
// Butterworth section run forward then backward over the whole sequence.

use crate::types::{FilterConfig, Skeleton};
use tracing::debug;

/// Shortest sequence the filter is applied to; shorter input passes through
pub const MIN_FILTER_LEN: usize = 3;

/// Second-order Butterworth low-pass biquad (direct form II transposed)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    /// Bilinear-transform design with frequency pre-warping
    pub fn lowpass(cutoff_hz: f64, sample_rate_hz: f64) -> Self {
        let k = (std::f64::consts::PI * cutoff_hz / sample_rate_hz).tan();
        let k2 = k * k;
        let sqrt2 = std::f64::consts::SQRT_2;
        let norm = 1.0 / (1.0 + sqrt2 * k + k2);

        let b0 = k2 * norm;
        Self {
            b: [b0, 2.0 * b0, b0],
            a: [2.0 * (k2 - 1.0) * norm, (1.0 - sqrt2 * k + k2) * norm],
        }
    }

    /// Single pass, with the state primed as if the first sample had been
    /// held forever (no start-up transient on a constant signal).
    fn run(&self, input: &[f64]) -> Vec<f64> {
        let [b0, b1, b2] = self.b;
        let [a1, a2] = self.a;

        let first = input.first().copied().unwrap_or(0.0);
        let mut z1 = (1.0 - b0) * first;
        let mut z2 = (b2 - a2) * first;

        input
            .iter()
            .map(|&x| {
                let y = b0 * x + z1;
                z1 = b1 * x - a1 * y + z2;
                z2 = b2 * x - a2 * y;
                y
            })
            .collect()
    }

    /// Forward-backward application with odd reflective padding
    pub fn filtfilt(&self, data: &[f64], max_pad: usize) -> Vec<f64> {
        let n = data.len();
        if n < MIN_FILTER_LEN {
            return data.to_vec();
        }

        let pad = max_pad.min(n - 1);
        let mut padded = Vec::with_capacity(n + 2 * pad);

        let (head, tail) = (data[0], data[n - 1]);
        padded.extend((1..=pad).rev().map(|i| 2.0 * head - data[i]));
        padded.extend_from_slice(data);
        padded.extend((1..=pad).map(|i| 2.0 * tail - data[n - 1 - i]));

        let mut forward = self.run(&padded);
        forward.reverse();
        let mut backward = self.run(&forward);
        backward.reverse();

        backward[pad..pad + n].to_vec()
    }
}

/// Smooths every keypoint's x and y series across the sequence
#[derive(Debug, Clone)]
pub struct TrajectoryFilter {
    biquad: Biquad,
    max_pad: usize,
}

impl TrajectoryFilter {
    pub fn new(config: &FilterConfig, sample_rate_hz: f64) -> Self {
        Self {
            biquad: Biquad::lowpass(config.cutoff_hz, sample_rate_hz),
            max_pad: config.max_pad,
        }
    }

    pub fn filter_series(&self, series: &[f64]) -> Vec<f64> {
        self.biquad.filtfilt(series, self.max_pad)
    }

    /// z and visibility pass through unmodified
    pub fn apply(&self, frames: &[Skeleton]) -> Vec<Skeleton> {
        if frames.len() < MIN_FILTER_LEN {
            debug!("Only {} frames, skipping trajectory filter", frames.len());
            return frames.to_vec();
        }

        let mut filtered = frames.to_vec();
        let num_points = frames[0].points().len();

        for idx in 0..num_points {
            let xs: Vec<f64> = frames.iter().map(|f| f[idx].x as f64).collect();
            let ys: Vec<f64> = frames.iter().map(|f| f[idx].y as f64).collect();

            let xs = self.filter_series(&xs);
            let ys = self.filter_series(&ys);

            for (frame, (x, y)) in filtered.iter_mut().zip(xs.into_iter().zip(ys)) {
                let kp = &mut frame.points_mut()[idx];
                kp.x = x as f32;
                kp.y = y as f32;
            }
        }

        debug!(
            "Filtered {} frames x {} keypoints",
            frames.len(),
            num_points
        );
        filtered
    }
}
