// src/pipeline/mod.rs

pub mod archive;
pub mod trial;

pub use archive::{ArchivedFrame, KeypointArchive};
pub use trial::{
    analyze_bilateral, analyze_leg, analyze_leg_blocking, validate_clip_duration,
    BilateralAnalysis, LegAnalysis, LegJob, TrialRunner,
};
