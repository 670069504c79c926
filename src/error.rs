use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScnError {
    #[error("failed to read")]
    Reader(#[from] std::io::Error),

    #[error("failed to read npz archive: {0}")]
    Npz(#[from] ndarray_npy::ReadNpzError),

    #[error("failed to read npy array: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ensemble member {member}: missing parameter `{key}`")]
    MissingParameter { member: usize, key: String },

    #[error("ensemble member {member}: parameter `{key}` has shape {actual:?}, expected {expected}")]
    ShapeMismatch {
        member: usize,
        key: String,
        expected: String,
        actual: Vec<usize>,
    },

    #[error("ensemble member {member} has dims {actual}, member 0 has {expected}")]
    EnsembleMismatch {
        member: usize,
        expected: String,
        actual: String,
    },

    #[error("{name} has length {actual}, expected {expected}")]
    InputShape {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("index {index} out of range for table of {len} rows")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("non-finite score at step {step}: {detail}")]
    NumericFault { step: usize, detail: String },

    #[error("word `{0}` is not in the vocabulary")]
    UnknownWord(String),

    #[error("batch has {images} image rows but {tags} tag rows")]
    BatchMismatch { images: usize, tags: usize },
}

pub type Result<T> = std::result::Result<T, ScnError>;
