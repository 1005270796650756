//! Statistics logging for model runs
//!
//! Values are logged under a name within an [`Event`]. A logger aggregates the values of each
//! name over many occurrences of the event, e.g. the mean critic value over all training passes.
pub mod cli;

pub use cli::CLILogger;

use enum_map::Enum;
use thiserror::Error;

/// Kind of occurrence that logged values are attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum Event {
    /// One play step: a single frame of an episode.
    Step,
    /// One training pass over the frames of a sequence.
    Sequence,
}

/// A loggable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Loggable {
    /// Marks the name as present without a value.
    Nothing,
    /// Real number. Aggregated by mean.
    Scalar(f64),
    /// Index drawn from `0 .. size`. Aggregated as an empirical distribution.
    IndexSample { value: usize, size: usize },
}

impl Loggable {
    /// Name of the variant, used in error messages.
    const fn kind_name(&self) -> &'static str {
        match self {
            Self::Nothing => "Nothing",
            Self::Scalar(_) => "Scalar",
            Self::IndexSample { .. } => "IndexSample",
        }
    }
}

impl From<f64> for Loggable {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<f32> for Loggable {
    fn from(value: f32) -> Self {
        Self::Scalar(value.into())
    }
}

/// Sink for logged statistics.
pub trait Logger {
    /// Log `value` under `name` for the current occurrence of `event`.
    ///
    /// Logging the same name twice within one occurrence keeps the last value.
    /// Fails if `value` cannot be aggregated with earlier values of the same name.
    fn log(&mut self, event: Event, name: &str, value: Loggable) -> Result<(), LogError>;

    /// End the current occurrence of `event`.
    fn done(&mut self, event: Event);
}

/// Discards everything.
impl Logger for () {
    fn log(&mut self, _: Event, _: &str, _: Loggable) -> Result<(), LogError> {
        Ok(())
    }

    fn done(&mut self, _: Event) {}
}

/// A logged value is incompatible with earlier values of the same name.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot log {value:?} as \"{name}\"; expected {expected}")]
pub struct LogError {
    pub name: String,
    pub value: Loggable,
    pub expected: String,
}

impl LogError {
    pub fn new<S: Into<String>>(name: &str, value: Loggable, expected: S) -> Self {
        Self {
            name: name.into(),
            value,
            expected: expected.into(),
        }
    }
}
