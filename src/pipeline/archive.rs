// src/pipeline/archive.rs
//
// Raw and filtered keypoints of one leg test, handed to the archival
// collaborator as a JSON blob.

use crate::types::{FailureReason, Leg, Skeleton};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedFrame {
    /// Seconds since the start of the test
    pub timestamp: f64,
    pub raw: Skeleton,
    pub filtered: Skeleton,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypointArchive {
    pub frames: Vec<ArchivedFrame>,
    /// Hz
    pub sampling_rate: u32,
    pub leg_tested: Leg,
    pub failure_reason: FailureReason,
    pub duration_seconds: f64,
}

impl KeypointArchive {
    /// `timestamps`, `raw` and `filtered` are parallel sequences
    pub fn new(
        leg_tested: Leg,
        sampling_rate: u32,
        failure_reason: FailureReason,
        duration_seconds: f64,
        timestamps: &[f64],
        raw: &[Skeleton],
        filtered: &[Skeleton],
    ) -> Self {
        let frames = timestamps
            .iter()
            .zip(raw.iter().zip(filtered))
            .map(|(&timestamp, (raw, filtered))| ArchivedFrame {
                timestamp,
                raw: raw.clone(),
                filtered: filtered.clone(),
            })
            .collect();

        Self {
            frames,
            sampling_rate,
            leg_tested,
            failure_reason,
            duration_seconds,
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        info!(
            "💾 Keypoint archive saved: {} ({} frames)",
            path.display(),
            self.frames.len()
        );
        Ok(())
    }
}
