// src/analysis/trend.rs
//
// Longitudinal classification of an athlete's hold times. Deterministic:
// the same history always produces the same analysis.

use super::metrics::MetricsRecord;
use super::scoring::DurationScore;
use crate::types::TrendConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One stored assessment as supplied by the history collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub record: Option<MetricsRecord>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrength {
    Significant,
    Moderate,
    Slight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionChange {
    /// Position of the later record of the reversing step
    pub index: usize,
    pub date: DateTime<Utc>,
    pub from_direction: Direction,
    pub to_direction: Direction,
    pub from_hold_time: f64,
    pub to_hold_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub hold_time: f64,
    pub duration_score: DurationScore,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTrajectory {
    pub first: ScoreSnapshot,
    pub peak: ScoreSnapshot,
    pub current: ScoreSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub trend: Trend,
    pub trend_strength: TrendStrength,
    pub direction_changes: Vec<DirectionChange>,
    pub score_trajectory: Option<ScoreTrajectory>,
    /// 1 - coefficient of variation of hold times, floored at 0
    pub consistency: f64,
    pub first_to_current_delta: f64,
    pub peak_to_current_delta: f64,
    /// Records that carried metrics; skipped entries are not counted
    pub assessment_count: usize,
}

pub struct TrendAnalyzer {
    config: TrendConfig,
}

/// A usable history point
struct Point<'a> {
    hold_time: f64,
    record: &'a MetricsRecord,
    date: DateTime<Utc>,
}

impl TrendAnalyzer {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    /// Accepts entries in any order; they are sorted by date first
    pub fn analyze(&self, history: &[HistoryEntry]) -> TrendAnalysis {
        let mut entries: Vec<&HistoryEntry> = history.iter().collect();
        entries.sort_by_key(|e| e.created_at);

        let points: Vec<Point> = entries
            .into_iter()
            .filter_map(|e| match &e.record {
                Some(record) => Some(Point {
                    hold_time: record.hold_time_seconds,
                    record,
                    date: e.created_at,
                }),
                None => {
                    warn!("Assessment from {} has no metrics, skipping", e.created_at);
                    None
                }
            })
            .collect();

        let holds: Vec<f64> = points.iter().map(|p| p.hold_time).collect();

        let (trend, trend_strength) = self.classify(&holds);
        let direction_changes = self.direction_changes(&points);
        let score_trajectory = score_trajectory(&points);

        let (first_to_current_delta, peak_to_current_delta) = match &score_trajectory {
            Some(t) => (
                t.current.hold_time - t.first.hold_time,
                t.peak.hold_time - t.current.hold_time,
            ),
            None => (0.0, 0.0),
        };

        debug!(
            "Trend over {} assessments: {:?} ({:?}), {} reversals",
            points.len(),
            trend,
            trend_strength,
            direction_changes.len()
        );

        TrendAnalysis {
            trend,
            trend_strength,
            direction_changes,
            score_trajectory,
            consistency: consistency(&holds),
            first_to_current_delta,
            peak_to_current_delta,
            assessment_count: points.len(),
        }
    }

    fn classify(&self, holds: &[f64]) -> (Trend, TrendStrength) {
        if holds.len() < 2 {
            return (Trend::Stable, TrendStrength::Slight);
        }

        let window = self.config.recent_window.max(1);
        let change = if holds.len() > window && holds.len() >= 4 {
            let (earlier, recent) = holds.split_at(holds.len() - window);
            relative_change(mean(earlier), mean(recent))
        } else {
            relative_change(holds[0], holds[holds.len() - 1])
        };

        let c = &self.config;
        let trend = if change >= c.trend_threshold {
            Trend::Improving
        } else if change <= -c.trend_threshold {
            Trend::Declining
        } else {
            Trend::Stable
        };

        let strength = if change.abs() > c.significant_threshold {
            TrendStrength::Significant
        } else if trend != Trend::Stable {
            TrendStrength::Moderate
        } else {
            TrendStrength::Slight
        };

        (trend, strength)
    }

    fn direction_changes(&self, points: &[Point]) -> Vec<DirectionChange> {
        let step = self.config.step_threshold;
        let mut changes = Vec::new();
        let mut last: Option<Direction> = None;

        for (i, pair) in points.windows(2).enumerate() {
            let (prev, curr) = (pair[0].hold_time, pair[1].hold_time);
            let direction = if curr > prev * (1.0 + step) {
                Direction::Up
            } else if curr < prev * (1.0 - step) {
                Direction::Down
            } else {
                continue;
            };

            if let Some(from) = last {
                if from != direction {
                    changes.push(DirectionChange {
                        index: i + 1,
                        date: pair[1].date,
                        from_direction: from,
                        to_direction: direction,
                        from_hold_time: prev,
                        to_hold_time: curr,
                    });
                }
            }
            last = Some(direction);
        }

        changes
    }
}

fn score_trajectory(points: &[Point]) -> Option<ScoreTrajectory> {
    let first = points.first()?;
    let current = points.last()?;

    // First maximum wins ties
    let mut peak = first;
    for p in points {
        if p.hold_time > peak.hold_time {
            peak = p;
        }
    }

    let snapshot = |p: &Point| ScoreSnapshot {
        hold_time: p.hold_time,
        duration_score: p.record.duration_score,
        date: p.date,
    };

    Some(ScoreTrajectory {
        first: snapshot(first),
        peak: snapshot(peak),
        current: snapshot(current),
    })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Fractional change from `base` to `value`. A zero base gives 0 when the
/// value is also 0, otherwise an infinite change in the value's direction.
fn relative_change(base: f64, value: f64) -> f64 {
    if base == 0.0 {
        if value == 0.0 {
            0.0
        } else {
            f64::INFINITY.copysign(value)
        }
    } else {
        (value - base) / base
    }
}

fn consistency(holds: &[f64]) -> f64 {
    if holds.len() < 2 {
        return 1.0;
    }
    let m = mean(holds);
    if m == 0.0 {
        return 0.5;
    }
    let var = holds.iter().map(|h| (h - m).powi(2)).sum::<f64>() / (holds.len() - 1) as f64;
    (1.0 - var.sqrt() / m).max(0.0)
}
