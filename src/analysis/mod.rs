// src/analysis/mod.rs
//
// Offline numeric core, run after extraction has finished.
//
//   filtered skeletons → metrics ─┬→ bilateral (left vs right)
//                                 └→ trend (history of records)
//
// Everything here is pure and synchronous.

pub mod bilateral;
pub mod metrics;
pub mod scoring;
pub mod trend;

pub use bilateral::{compare, BilateralComparison, DominantLeg, SymmetryAssessment};
pub use metrics::{MetricsCalculator, MetricsRecord, METRICS_SCHEMA_VERSION};
pub use scoring::{AgeExpectation, DurationScore};
pub use trend::{
    Direction, DirectionChange, HistoryEntry, ScoreSnapshot, ScoreTrajectory, Trend,
    TrendAnalysis, TrendAnalyzer, TrendStrength,
};
