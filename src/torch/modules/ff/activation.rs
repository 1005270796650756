//! Activation functions
use serde::{Deserialize, Serialize};
use tch::Tensor;

/// Elementwise activation function applied after a hidden layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    Identity,
    /// Rectified linear: `max(x, 0)`
    Relu,
    Sigmoid,
    Tanh,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Relu
    }
}

impl Activation {
    /// Apply the activation, consuming the input.
    #[inline]
    pub fn apply(self, x: Tensor) -> Tensor {
        match self {
            Self::Identity => x,
            Self::Relu => x.relu(),
            Self::Sigmoid => x.sigmoid(),
            Self::Tanh => x.tanh(),
        }
    }
}
