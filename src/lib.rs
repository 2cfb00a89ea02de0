// src/lib.rs
//
// Single-leg balance test analysis.
//
//   FrameSource → PoseExtractor → FailureDetector (online)
//               → TrajectoryFilter → MetricsCalculator
//               → bilateral comparison / longitudinal trend

pub mod analysis;
pub mod config;
pub mod error;
pub mod failure_detector;
pub mod frame_source;
pub mod inference;
pub mod landmarks;
pub mod pipeline;
pub mod pose;
pub mod preprocessing;
pub mod trajectory_filter;
pub mod types;

pub use error::AnalysisError;
pub use types::{Config, FailureReason, Leg};
