//! Linear layer
use super::super::{BuildModule, FeedForwardModule, Module};
use crate::torch::initializers::{Initializer, FINAL_LAYER_BOUND};
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{nn::Path, Tensor};

/// Configuration for the [`Linear`] module.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConfig {
    /// Initializer for the kernel (weight) matrix of shape `[out_dim, in_dim]`.
    pub kernel_init: Initializer,
    /// Initializer for the bias vector, if one exists.
    ///
    /// The bias fan-in is the layer input dimension.
    pub bias_init: Option<Initializer>,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            kernel_init: Initializer::FanInUniform,
            bias_init: Some(Initializer::FanInUniform),
        }
    }
}

impl LinearConfig {
    /// Configuration for an output layer with kernel sampled from `Unif(±FINAL_LAYER_BOUND)`.
    pub fn output_layer() -> Self {
        Self {
            kernel_init: Initializer::Uniform(FINAL_LAYER_BOUND),
            ..Self::default()
        }
    }
}

impl BuildModule for LinearConfig {
    type Module = Linear;

    fn build_module(&self, vs: &Path, in_dim: usize, out_dim: usize) -> Self::Module {
        Linear::new(vs, in_dim, out_dim, self)
    }
}

/// Linear fully-connected layer module.
#[derive(Debug, PartialEq)]
pub struct Linear {
    kernel: Tensor,
    bias: Option<Tensor>,
}

impl Linear {
    pub fn new(vs: &Path, in_dim: usize, out_dim: usize, config: &LinearConfig) -> Self {
        Self {
            // The kernel fan-in is left to the initializer default (the first dimension)
            kernel: config
                .kernel_init
                .tensor(&[out_dim, in_dim])
                .add_to(vs, "weight"),
            bias: config
                .bias_init
                .map(|init| init.tensor(&[out_dim]).fan_in(in_dim).add_to(vs, "bias")),
        }
    }

    /// Kernel (weight) matrix of shape `[out_dim, in_dim]`.
    pub const fn kernel(&self) -> &Tensor {
        &self.kernel
    }

    /// Bias vector of shape `[out_dim]`, if any.
    pub const fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }
}

impl Module for Linear {
    #[inline]
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(iter::once(&self.kernel).chain(self.bias.iter()))
    }
}

impl FeedForwardModule for Linear {
    #[inline]
    fn forward(&self, input: &Tensor) -> Tensor {
        input.linear(&self.kernel, self.bias.as_ref())
    }
}
