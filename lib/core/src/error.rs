use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Model not fitted: run fit or load a saved model first")]
    NotFitted,

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Invalid image shape: expected (3, {expected}, {expected}), got ({channels}, {height}, {width})")]
    InvalidImageShape {
        expected: usize,
        channels: usize,
        height: usize,
        width: usize,
    },

    #[error("Feature grid mismatch: expected {expected:?}, got {actual:?}")]
    GridMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("Cannot fit matcher on an empty patch pool")]
    EmptyPool,

    #[error("Backbone error: {0}")]
    Backbone(String),

    #[error("Backbone mismatch: artifact was fitted with '{artifact}', extractor is '{extractor}'")]
    BackboneMismatch { artifact: String, extractor: String },

    #[error("Model file not found: {0}")]
    ModelFileMissing(std::path::PathBuf),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
