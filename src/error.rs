//! Error type
use crate::logging::LogError;
use tch::TchError;
use thiserror::Error;

/// Error from the tracking model.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("{what}: expected shape {expected}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        actual: Vec<i64>,
    },
    #[error("training forward pass requires actions")]
    MissingActions,
    #[error("training forward pass requires at least one frame")]
    EmptySequence,
    #[error("error loading backbone weights")]
    LoadBackbone(#[from] TchError),
    #[error("error logging statistics")]
    Log(#[from] LogError),
    #[error("pretrained weights have no variable \"{0}\"")]
    MissingVariable(String),
    #[error("no backbone variables under \"{0}\"")]
    NoBackbone(String),
    #[error("pretrained variable \"{name}\" has shape {actual:?}, expected {expected:?}")]
    VariableShape {
        name: String,
        expected: Vec<i64>,
        actual: Vec<i64>,
    },
}
