//! Policy network
use crate::torch::distributions::Categorical;
use crate::torch::modules::{
    Activation, BuildModule, FeedForwardModule, Linear, LinearConfig, Module,
};
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{nn::Path, Kind, Tensor};

/// Configuration for the [`Actor`] network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Sizes of the hidden layers
    pub hidden_sizes: Vec<usize>,
    /// Activation function after each hidden layer.
    pub activation: Activation,
    /// Configuration for the hidden layers
    pub hidden_layer: LinearConfig,
    /// Configuration for the output layer
    pub output_layer: LinearConfig,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![256, 128, 64],
            activation: Activation::Relu,
            hidden_layer: LinearConfig::default(),
            output_layer: LinearConfig::output_layer(),
        }
    }
}

impl BuildModule for ActorConfig {
    type Module = Actor;

    fn build_module(&self, vs: &Path, in_dim: usize, out_dim: usize) -> Self::Module {
        Actor::new(vs, in_dim, out_dim, self)
    }
}

/// Action distribution produced by the [`Actor`].
///
/// Both tensors have shape `[BATCH_SIZE, NUM_ACTIONS]` and are derived from the same scores.
#[derive(Debug, PartialEq)]
pub struct PolicyOutput {
    /// Action probabilities. Non-negative and sum to 1 along the last dimension.
    pub probs: Tensor,
    /// Natural log of the action probabilities.
    pub log_probs: Tensor,
}

impl PolicyOutput {
    /// The action distribution as a [`Categorical`] for sampling.
    pub fn distribution(&self) -> Categorical {
        Categorical::new(&self.log_probs)
    }
}

/// Policy network: a multi-layer perceptron with softmax outputs.
///
/// Does not sample; see [`PolicyOutput::distribution`].
#[derive(Debug)]
pub struct Actor {
    layers: Vec<Linear>,
    output: Linear,
    activation: Activation,
}

impl Actor {
    pub fn new(vs: &Path, in_dim: usize, out_dim: usize, config: &ActorConfig) -> Self {
        let in_dims = iter::once(&in_dim).chain(&config.hidden_sizes);
        let layers: Vec<_> = in_dims
            .zip(&config.hidden_sizes)
            .enumerate()
            .map(|(i, (&in_, &out_))| {
                config
                    .hidden_layer
                    .build_module(&(vs / format!("fc{}", i + 1)), in_, out_)
            })
            .collect();
        let last_dim = config.hidden_sizes.last().copied().unwrap_or(in_dim);
        let output = config.output_layer.build_module(
            &(vs / format!("fc{}", layers.len() + 1)),
            last_dim,
            out_dim,
        );
        Self {
            layers,
            output,
            activation: config.activation,
        }
    }

    /// Action distribution for a batch of states.
    ///
    /// # Args
    /// * `state` - A tensor of shape `[BATCH_SIZE, STATE_DIM]`.
    pub fn forward(&self, state: &Tensor) -> PolicyOutput {
        let hidden = self.layers.iter().fold(state.shallow_clone(), |x, layer| {
            self.activation.apply(layer.forward(&x))
        });
        let scores = self.output.forward(&hidden);
        PolicyOutput {
            probs: scores.softmax(-1, Kind::Float),
            log_probs: scores.log_softmax(-1, Kind::Float),
        }
    }
}

impl Module for Actor {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(
            self.layers
                .iter()
                .chain(iter::once(&self.output))
                .flat_map(Module::variables),
        )
    }
}
