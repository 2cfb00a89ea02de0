// src/pose/mod.rs

mod extractor;
mod tracker;

pub use extractor::{ExtractionStats, PoseExtractor, PoseModel, PoseModelFactory};
pub use tracker::RoiTracker;

#[cfg(test)]
pub(crate) use extractor::test_support;
