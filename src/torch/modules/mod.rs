//! Neural network modules
pub mod ff;
pub mod seq;
#[cfg(test)]
pub mod testing;

pub use ff::{Activation, Linear, LinearConfig};
pub use seq::{HiddenState, IterativeModule, Lstm, LstmConfig};

use tch::{nn::Path, Tensor};

/// A neural network module owning its parameter tensors.
pub trait Module {
    /// All variables (parameter tensors) of the module.
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_>;

    /// The variables that are updated by gradient descent.
    fn trainable_variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.variables().filter(|v| v.requires_grad()))
    }
}

/// A module that maps a batch of input feature vectors to output feature vectors.
pub trait FeedForwardModule: Module {
    /// Apply the module to a batch of inputs.
    ///
    /// # Args
    /// * `input` - A tensor of shape `[BATCH_SHAPE.., NUM_INPUT_FEATURES]`
    ///
    /// # Returns
    /// A tensor of shape `[BATCH_SHAPE.., NUM_OUTPUT_FEATURES]`
    fn forward(&self, input: &Tensor) -> Tensor;
}

/// Build a module with variables stored under a [`Path`].
pub trait BuildModule {
    type Module;

    /// Build a new module instance.
    ///
    /// # Args
    /// * `vs` - Variable store path under which the module variables are created.
    /// * `in_dim` - Number of input features.
    /// * `out_dim` - Number of output features.
    fn build_module(&self, vs: &Path, in_dim: usize, out_dim: usize) -> Self::Module;
}
