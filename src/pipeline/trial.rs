// src/pipeline/trial.rs
//
// One leg test from decoded frames to a metrics record:
//
//   frames → PoseExtractor → FailureDetector (online, stops the run)
//          → validation → TrajectoryFilter → MetricsCalculator
//
// A run is a single sequential blocking unit. Dual-leg assessments run two
// units side by side on the blocking pool, each with its own model.

use super::archive::KeypointArchive;
use crate::analysis::{compare, BilateralComparison, MetricsCalculator, MetricsRecord};
use crate::error::AnalysisError;
use crate::failure_detector::FailureDetector;
use crate::frame_source::FrameSource;
use crate::pose::{ExtractionStats, PoseExtractor, PoseModel, PoseModelFactory};
use crate::trajectory_filter::TrajectoryFilter;
use crate::types::{Config, Leg, SampledFrame, Skeleton, ValidationConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of analysing one leg video
#[derive(Debug, Clone)]
pub struct LegAnalysis {
    pub leg: Leg,
    pub record: MetricsRecord,
    pub archive: KeypointArchive,
    pub stats: ExtractionStats,
}

#[derive(Debug, Clone)]
pub struct BilateralAnalysis {
    pub left: LegAnalysis,
    pub right: LegAnalysis,
    pub comparison: BilateralComparison,
}

/// A leg video awaiting analysis
#[derive(Debug, Clone)]
pub struct LegJob {
    pub path: PathBuf,
    /// Clip length measured by the uploader (s)
    pub clip_duration: f64,
}

pub struct TrialRunner {
    config: Config,
    leg: Leg,
}

impl TrialRunner {
    pub fn new(config: Config, leg: Leg) -> Self {
        Self { config, leg }
    }

    /// Consumes `frames` until the test ends, the safety cutoff is passed or
    /// the stream runs out. The model is released on every exit path.
    pub fn run<I>(
        &self,
        frames: I,
        model: Box<dyn PoseModel>,
        clip_duration: f64,
    ) -> Result<LegAnalysis, AnalysisError>
    where
        I: IntoIterator<Item = Result<SampledFrame, AnalysisError>>,
    {
        let started = Instant::now();
        let target_fps = self.config.video.target_fps.max(1);
        let cutoff = self.config.video.safety_cutoff_seconds;

        let mut extractor = PoseExtractor::new(model);
        let mut detector = FailureDetector::new(self.config.detector.clone(), self.leg);

        let mut raw: Vec<Skeleton> = Vec::new();
        let mut timestamps: Vec<f64> = Vec::new();
        let mut frame_size = (0, 0);
        let mut stream_exhausted = true;

        for frame in frames {
            let frame = frame?;
            let t = frame.timestamp_seconds();
            if t > cutoff {
                info!("Safety cutoff reached at {:.2}s", t);
                stream_exhausted = false;
                break;
            }
            if frame_size == (0, 0) {
                frame_size = (frame.image.width, frame.image.height);
            }

            let Some(skeleton) = extractor.process(&frame.image, frame.timestamp_ms)? else {
                continue;
            };

            let ended = detector.observe(&skeleton, t);
            raw.push(skeleton);
            timestamps.push(t);

            if ended.is_some() {
                stream_exhausted = false;
                break;
            }
        }

        let stats = extractor.close();
        stats.validate(&self.config.validation)?;

        if stream_exhausted {
            if let Some(estimated) = self.clip_duration_mismatch(timestamps.len(), clip_duration) {
                warn!(
                    "Clip duration {:.2}s disagrees with {:.2}s of frames with pose",
                    clip_duration, estimated
                );
            }
        }

        let failure_reason = detector.outcome();
        debug!(
            "Detector finished in {} ({:?})",
            detector.state().name(),
            failure_reason
        );

        let filter = TrajectoryFilter::new(&self.config.filter, target_fps as f64);
        let filtered = filter.apply(&raw);

        let calculator =
            MetricsCalculator::new(self.config.metrics.clone(), frame_size.0, frame_size.1);
        let record = calculator.compute(&filtered, &timestamps, failure_reason);

        let archive = KeypointArchive::new(
            self.leg,
            target_fps,
            failure_reason,
            record.hold_time_seconds,
            &timestamps,
            &raw,
            &filtered,
        );

        info!(
            "✓ {} leg analysed: {:.2}s hold ({}), {}/{} frames with pose, took {:.2?}",
            self.leg,
            record.hold_time_seconds,
            failure_reason,
            stats.frames_with_pose,
            stats.frames_processed,
            started.elapsed()
        );

        Ok(LegAnalysis {
            leg: self.leg,
            record,
            archive,
            stats,
        })
    }

    /// Duration implied by the frames with a detected pose, when it differs
    /// from the uploader's measurement by more than the tolerance
    fn clip_duration_mismatch(&self, frames_with_pose: usize, clip_duration: f64) -> Option<f64> {
        let fps = self.config.video.target_fps.max(1) as f64;
        let estimated = frames_with_pose as f64 / fps;
        let tolerance = self.config.validation.duration_mismatch_warn_seconds;
        ((clip_duration - estimated).abs() > tolerance).then_some(estimated)
    }
}

pub fn validate_clip_duration(seconds: f64, cfg: &ValidationConfig) -> Result<(), AnalysisError> {
    if seconds.is_finite() && seconds >= cfg.min_clip_seconds && seconds <= cfg.max_clip_seconds {
        Ok(())
    } else {
        Err(AnalysisError::InvalidDuration(seconds))
    }
}

/// Full blocking analysis of one leg video
pub fn analyze_leg(
    config: &Config,
    factory: &dyn PoseModelFactory,
    path: &Path,
    leg: Leg,
    clip_duration: f64,
) -> Result<LegAnalysis, AnalysisError> {
    validate_clip_duration(clip_duration, &config.validation)?;

    info!("Analysing {} leg: {}", leg, path.display());
    let source = FrameSource::open(path, config.video.target_fps)?;
    let model = factory.create()?;

    TrialRunner::new(config.clone(), leg).run(source, model, clip_duration)
}

/// Runs `analyze_leg` on the blocking pool
pub async fn analyze_leg_blocking(
    config: Arc<Config>,
    factory: Arc<dyn PoseModelFactory>,
    job: LegJob,
    leg: Leg,
) -> Result<LegAnalysis, AnalysisError> {
    run_blocking(move || analyze_leg(&config, factory.as_ref(), &job.path, leg, job.clip_duration))
        .await
}

/// Analyses both legs concurrently and compares them
pub async fn analyze_bilateral(
    config: Arc<Config>,
    factory: Arc<dyn PoseModelFactory>,
    left: LegJob,
    right: LegJob,
) -> Result<BilateralAnalysis, AnalysisError> {
    let left_task = analyze_leg_blocking(config.clone(), factory.clone(), left, Leg::Left);
    let right_task = analyze_leg_blocking(config.clone(), factory, right, Leg::Right);

    join_legs(left_task, right_task, &config).await
}

async fn join_legs<L, R>(left: L, right: R, config: &Config) -> Result<BilateralAnalysis, AnalysisError>
where
    L: std::future::Future<Output = Result<LegAnalysis, AnalysisError>>,
    R: std::future::Future<Output = Result<LegAnalysis, AnalysisError>>,
{
    let (left, right) = tokio::join!(left, right);
    let (left, right) = (left?, right?);

    let comparison = compare(&left.record, &right.record, &config.bilateral);
    info!(
        "Bilateral symmetry {:.1} ({:?}), dominant {:?}",
        comparison.overall_symmetry_score, comparison.symmetry_assessment, comparison.dominant_leg
    );

    Ok(BilateralAnalysis {
        left,
        right,
        comparison,
    })
}

async fn run_blocking<F>(work: F) -> Result<LegAnalysis, AnalysisError>
where
    F: FnOnce() -> Result<LegAnalysis, AnalysisError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AnalysisError::Worker(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DominantLeg;
    use crate::frame_source::FrameClock;
    use crate::landmarks::RIGHT_ANKLE;
    use crate::pose::test_support::{blank_frame, ScriptedModel};
    use crate::types::test_support::{t_pose, with_point};
    use crate::types::FailureReason;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn frames(n: usize) -> Vec<Result<SampledFrame, AnalysisError>> {
        let mut clock = FrameClock::new(30.0, 30);
        (0..n)
            .filter_map(|_| clock.tick())
            .map(|timestamp_ms| {
                Ok(SampledFrame {
                    image: blank_frame(),
                    timestamp_ms,
                })
            })
            .collect()
    }

    fn touched_down() -> Skeleton {
        with_point(t_pose(), RIGHT_ANKLE, 0.55, 0.89)
    }

    fn runner() -> TrialRunner {
        TrialRunner::new(Config::default(), Leg::Left)
    }

    fn model(script: Vec<Option<Skeleton>>) -> Box<dyn PoseModel> {
        Box::new(ScriptedModel::new(script))
    }

    #[test]
    fn test_touchdown_ends_extraction() {
        let mut script = vec![Some(t_pose()); 150];
        script.push(Some(touched_down()));
        script.extend(vec![Some(t_pose()); 149]);
        let counter = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel::new(script).with_close_counter(counter.clone());

        let result = runner().run(frames(300), Box::new(model), 10.0).unwrap();

        assert_eq!(result.stats.frames_processed, 151);
        assert_eq!(result.record.failure_reason, FailureReason::FootTouchdown);
        assert!(!result.record.success);
        assert!((result.record.hold_time_seconds - 5.001).abs() < 1e-9);
        assert_eq!(result.record.duration_score.value(), 1);
        assert_eq!(result.archive.frames.len(), 151);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_full_hold_completes_at_time_budget() {
        let script = vec![Some(t_pose()); 1200];
        let result = runner().run(frames(1200), model(script), 40.0).unwrap();

        assert_eq!(result.record.failure_reason, FailureReason::TimeComplete);
        assert!(result.record.success);
        assert_eq!(result.stats.frames_processed, 901);
        assert!((result.record.hold_time_seconds - 30.001).abs() < 1e-9);
        assert_eq!(result.record.duration_score.value(), 5);
        assert_eq!(result.archive.duration_seconds, result.record.hold_time_seconds);
    }

    #[test]
    fn test_safety_cutoff() {
        let mut config = Config::default();
        config.detector.time_budget_seconds = 100.0;
        let runner = TrialRunner::new(config, Leg::Left);

        let result = runner
            .run(frames(1200), model(vec![Some(t_pose()); 1200]), 40.0)
            .unwrap();

        assert_eq!(result.stats.frames_processed, 1050);
        assert!((result.record.hold_time_seconds - 34.967).abs() < 1e-9);
        assert_eq!(result.record.failure_reason, FailureReason::TimeComplete);
    }

    #[test]
    fn test_insufficient_detection_produces_no_record() {
        // 4 of 10 frames with a pose
        let script = (0..10)
            .map(|i| (i % 5 < 2).then(t_pose))
            .collect::<Vec<_>>();
        let err = runner().run(frames(10), model(script), 5.0).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientPoseDetection {
                frames_with_pose: 4,
                frames_processed: 10
            }
        ));
    }

    #[test]
    fn test_half_detection_is_enough() {
        let script = (0..10).map(|i| (i % 2 == 0).then(t_pose)).collect();
        let result = runner().run(frames(10), model(script), 5.0).unwrap();
        assert_eq!(result.stats.frames_with_pose, 5);
        assert_eq!(result.record.failure_reason, FailureReason::TimeComplete);
    }

    #[test]
    fn test_empty_and_poseless_videos() {
        let err = runner().run(frames(0), model(vec![]), 5.0).unwrap_err();
        assert!(matches!(err, AnalysisError::NoFramesExtracted));

        let err = runner().run(frames(20), model(vec![None; 20]), 5.0).unwrap_err();
        assert!(matches!(err, AnalysisError::NoPoseDetected));
    }

    #[test]
    fn test_decode_error_releases_model() {
        let counter = Arc::new(AtomicUsize::new(0));
        let model = ScriptedModel::new(vec![Some(t_pose()); 10]).with_close_counter(counter.clone());

        let mut stream = frames(10);
        stream[5] = Err(AnalysisError::Decode("corrupt packet".into()));

        let err = runner().run(stream, Box::new(model), 5.0).unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clip_duration_mismatch_counts_frames_with_pose() {
        let runner = runner();
        // 300 frames with pose at 30 fps = 10 s
        assert_eq!(runner.clip_duration_mismatch(300, 11.5), None);
        assert_eq!(runner.clip_duration_mismatch(300, 12.5), Some(10.0));
        assert_eq!(runner.clip_duration_mismatch(300, 7.5), Some(10.0));
    }

    #[test]
    fn test_clip_duration_bounds() {
        let cfg = ValidationConfig::default();
        assert!(validate_clip_duration(5.0, &cfg).is_ok());
        assert!(validate_clip_duration(40.0, &cfg).is_ok());
        assert!(validate_clip_duration(4.99, &cfg).is_err());
        assert!(validate_clip_duration(40.01, &cfg).is_err());
        assert!(validate_clip_duration(f64::NAN, &cfg).is_err());
    }

    #[test]
    fn test_invalid_duration_checked_before_opening_video() {
        struct NoModels;
        impl PoseModelFactory for NoModels {
            fn create(&self) -> Result<Box<dyn PoseModel>, AnalysisError> {
                Err(AnalysisError::PoseModel("unexpected".into()))
            }
        }

        let err = analyze_leg(
            &Config::default(),
            &NoModels,
            Path::new("/nonexistent/clip.mp4"),
            Leg::Left,
            3.0,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidDuration(d) if d == 3.0));
    }

    #[tokio::test]
    async fn test_legs_run_independently_and_compare() {
        let config = Config::default();

        let left = run_blocking(|| {
            TrialRunner::new(Config::default(), Leg::Left).run(
                frames(600),
                Box::new(ScriptedModel::new(vec![Some(t_pose()); 600])),
                20.0,
            )
        });
        let right = run_blocking(|| {
            let mut script = vec![Some(t_pose()); 300];
            script.push(Some(touched_down()));
            TrialRunner::new(Config::default(), Leg::Left).run(
                frames(600),
                Box::new(ScriptedModel::new(script)),
                20.0,
            )
        });

        let result = join_legs(left, right, &config).await.unwrap();
        assert!(result.left.record.hold_time_seconds > 19.9);
        assert!((result.right.record.hold_time_seconds - 10.001).abs() < 1e-9);
        assert_eq!(result.comparison.dominant_leg, DominantLeg::Left);
    }

    #[tokio::test]
    async fn test_leg_error_propagates_from_join() {
        let left = run_blocking(|| {
            TrialRunner::new(Config::default(), Leg::Left).run(frames(0), model(vec![]), 5.0)
        });
        let right = run_blocking(|| {
            TrialRunner::new(Config::default(), Leg::Right).run(
                frames(30),
                model(vec![Some(t_pose()); 30]),
                5.0,
            )
        });
        let err = join_legs(left, right, &Config::default()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoFramesExtracted));
    }
}
