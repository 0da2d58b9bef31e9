use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "Dataset not found at: {0}\nSet {env} to your dataset path, or place the dataset there.\nThe folder should contain category subfolders like 'bottle', 'cable', etc.",
        env = crate::mvtec::ENV_DATA_ROOT
    )]
    RootMissing(PathBuf),

    #[error(
        "Did not find expected MVTec structure under: {0}\nExpected: <category>/train/good and <category>/test"
    )]
    LayoutInvalid(PathBuf),

    #[error("No category folders found under: {0}")]
    NoCategories(PathBuf),

    #[error("Missing train/good for category '{category}': {path}")]
    MissingTrainGood { category: String, path: PathBuf },

    #[error("Missing test folder: {0}")]
    MissingTestSplit(PathBuf),

    #[error("Missing ground truth mask for {0}")]
    MissingMask(PathBuf),

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
