// src/error.rs

/// Fatal outcomes of analysing a balance-test video.
///
/// A test that ends early (touchdown, foot moved) is not an error; it is a
/// `FailureReason` inside a successful result.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Video could not be decoded: {0}")]
    Decode(String),

    #[error("No frames could be extracted from the video")]
    NoFramesExtracted,

    #[error("No person detected in the video")]
    NoPoseDetected,

    #[error(
        "Person detected in fewer than half of the frames ({frames_with_pose}/{frames_processed})"
    )]
    InsufficientPoseDetection {
        frames_with_pose: usize,
        frames_processed: usize,
    },

    #[error("Clip duration {0:.1}s is outside the accepted range")]
    InvalidDuration(f64),

    #[error("Pose model error: {0}")]
    PoseModel(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Analysis worker failed: {0}")]
    Worker(String),
}

impl From<opencv::Error> for AnalysisError {
    fn from(e: opencv::Error) -> Self {
        AnalysisError::Decode(e.to_string())
    }
}

impl From<ort::Error> for AnalysisError {
    fn from(e: ort::Error) -> Self {
        AnalysisError::PoseModel(e.to_string())
    }
}
