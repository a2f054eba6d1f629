use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Error converting PathBuf to String. Path is likely not valid UTF-8.")]
    PathBufToString,
    #[error("The input path {0:?} does not exist.")]
    InputPathNotFound(PathBuf),
    #[error("The {0} dataset is empty.")]
    EmptyDataset(&'static str),
    #[error("Expected feature vectors of length {expected}, found one of length {found}.")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("The label {0:?} was not seen when the label index was fit.")]
    UnseenLabel(String),
    #[error("Invalid split weights {0:?}. Weights must be finite, non-negative, and sum to a positive value.")]
    InvalidSplitWeights(Vec<f64>),
    #[error("The model path {0:?} already exists.")]
    ModelPathExists(PathBuf),
    #[error("The model at {path:?} is corrupt: {reason}")]
    CorruptModel { path: PathBuf, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
