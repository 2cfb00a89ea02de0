// src/analysis/scoring.rs
//
// LTAD duration tiers and age-stage expectations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 1..=5 tier of hold time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DurationScore(u8);

impl DurationScore {
    pub const MIN: DurationScore = DurationScore(1);
    pub const MAX: DurationScore = DurationScore(5);

    pub fn new(score: u8) -> Option<Self> {
        (1..=5).contains(&score).then_some(Self(score))
    }

    /// `tiers` holds the lower bound of scores 2..=5. Below the first bound
    /// is 1 (including negative input); at or above the last is 5.
    pub fn from_hold_time(seconds: f64, tiers: &[f64; 4]) -> Self {
        let reached = tiers.iter().filter(|&&bound| seconds >= bound).count();
        Self(1 + reached as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Beginning",
            2 => "Developing",
            3 => "Competent",
            4 => "Proficient",
            _ => "Advanced",
        }
    }

    /// Compares the score to what is typical for the athlete's age
    pub fn age_expectation(self, age: u32) -> AgeExpectation {
        let Some(expected) = expected_score_for_age(age) else {
            return AgeExpectation::Meets;
        };
        match self.cmp(&expected) {
            std::cmp::Ordering::Greater => AgeExpectation::Above,
            std::cmp::Ordering::Less => AgeExpectation::Below,
            std::cmp::Ordering::Equal => AgeExpectation::Meets,
        }
    }
}

impl Default for DurationScore {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<u8> for DurationScore {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        DurationScore::new(v).ok_or_else(|| format!("duration score {} outside 1..=5", v))
    }
}

impl From<DurationScore> for u8 {
    fn from(s: DurationScore) -> u8 {
        s.0
    }
}

impl fmt::Display for DurationScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/5 ({})", self.0, self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeExpectation {
    Below,
    Meets,
    Above,
}

/// Expected tier by developmental stage (ages 5-13)
fn expected_score_for_age(age: u32) -> Option<DurationScore> {
    let score = match age {
        5..=6 => 1,
        7 => 2,
        8..=9 => 3,
        10..=11 => 4,
        12..=13 => 5,
        _ => return None,
    };
    Some(DurationScore(score))
}
