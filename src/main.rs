// src/main.rs

use anyhow::{bail, Context, Result};
use balance_assessment::analysis::{HistoryEntry, TrendAnalyzer};
use balance_assessment::inference::OnnxPoseModelFactory;
use balance_assessment::pipeline::{self, LegAnalysis, LegJob};
use balance_assessment::pose::PoseModelFactory;
use balance_assessment::{Config, Leg};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  balance-assessment single <left|right> <video> <clip_seconds> [archive.json]
  balance-assessment dual <left_video> <left_seconds> <right_video> <right_seconds>
  balance-assessment trend <history.json>";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("BALANCE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config_found = Path::new(&config_path).exists();
    let config = if config_found {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if config_found {
        info!("✓ Configuration loaded from {}", config_path);
    } else {
        warn!("{} not found, using built-in defaults", config_path);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!("{}", USAGE);
    };

    let factory: Arc<dyn PoseModelFactory> =
        Arc::new(OnnxPoseModelFactory::new(config.pose.clone()));
    let config = Arc::new(config);

    let output = match (command.as_str(), &args[1..]) {
        ("single", [leg, video, seconds, rest @ ..]) if rest.len() <= 1 => {
            let leg: Leg = leg.parse().map_err(anyhow::Error::msg)?;
            let job = LegJob {
                path: PathBuf::from(video),
                clip_duration: parse_seconds(seconds)?,
            };
            let analysis = pipeline::analyze_leg_blocking(config, factory, job, leg).await?;

            if let Some(archive_path) = rest.first() {
                analysis
                    .archive
                    .write_json(archive_path)
                    .with_context(|| format!("Failed to write archive {}", archive_path))?;
            }
            leg_json(&analysis)
        }

        ("dual", [left_video, left_seconds, right_video, right_seconds]) => {
            let left = LegJob {
                path: PathBuf::from(left_video),
                clip_duration: parse_seconds(left_seconds)?,
            };
            let right = LegJob {
                path: PathBuf::from(right_video),
                clip_duration: parse_seconds(right_seconds)?,
            };
            let result = pipeline::analyze_bilateral(config, factory, left, right).await?;
            json!({
                "left": leg_json(&result.left),
                "right": leg_json(&result.right),
                "comparison": result.comparison,
            })
        }

        ("trend", [history_path]) => {
            let text = std::fs::read_to_string(history_path)
                .with_context(|| format!("Failed to read history {}", history_path))?;
            let history: Vec<HistoryEntry> = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse history {}", history_path))?;
            let analysis = TrendAnalyzer::new(config.trend.clone()).analyze(&history);
            serde_json::to_value(analysis)?
        }

        _ => bail!("{}", USAGE),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_seconds(raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .with_context(|| format!("Invalid clip duration '{}'", raw))
}

fn leg_json(analysis: &LegAnalysis) -> serde_json::Value {
    let score = analysis.record.duration_score;
    json!({
        "leg_tested": analysis.leg,
        "record": analysis.record,
        "duration_label": score.label(),
        "frames_processed": analysis.stats.frames_processed,
        "frames_with_pose": analysis.stats.frames_with_pose,
    })
}
