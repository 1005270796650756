//! Sequence modules
mod lstm;

pub use lstm::{HiddenState, Lstm, LstmConfig};

use tch::Tensor;

/// A network module that operates iteratively on a sequence of data.
///
/// The state is owned by the caller and threaded through the steps.
pub trait IterativeModule {
    /// Internal state of the module.
    type State;

    /// Construct an initial state for the start of a new batch of sequences.
    fn initial_state(&self, batch_size: usize) -> Self::State;

    /// Apply one step of the module and update `state` in place.
    ///
    /// # Args
    /// * `state` - The hidden state from the previous step.
    /// * `input` - The input for one (batched) step.
    ///     A tensor with shape `[BATCH_SIZE, NUM_INPUT_FEATURES]`
    ///
    /// # Returns
    /// The output tensor. Has shape `[BATCH_SIZE, NUM_OUT_FEATURES]`
    fn step(&self, state: &mut Self::State, input: &Tensor) -> Tensor;
}
