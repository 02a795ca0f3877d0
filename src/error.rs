use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed annotation {path:?}: {reason}")]
    MalformedAnnotation { path: PathBuf, reason: String },

    #[error("image {image:?} has no matching annotation")]
    MissingAnnotation { image: PathBuf },

    #[error("sample {sample} has {found} landmarks, expected {expected}")]
    InconsistentLandmarkCount {
        sample: String,
        found: usize,
        expected: usize,
    },

    #[error("bounding box cannot be placed inside a {width}x{height} image: {reason}")]
    Geometry {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("bounding box has zero extent ({width}x{height})")]
    DegenerateBox { width: i64, height: i64 },

    #[error("similarity transform could not be estimated: {0}")]
    TransformEstimation(String),

    #[error("linear part of transform is singular (det = {det:e})")]
    SingularTransform { det: f64 },

    #[error("no samples survived preprocessing")]
    EmptyCorpus,
}

impl PrepError {
    /// Per-sample failures that are logged and skipped instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PrepError::Geometry { .. }
                | PrepError::DegenerateBox { .. }
                | PrepError::TransformEstimation(_)
                | PrepError::SingularTransform { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;
