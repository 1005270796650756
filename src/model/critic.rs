//! Value network
use crate::torch::modules::{FeedForwardModule, Linear, LinearConfig, Module};
use serde::{Deserialize, Serialize};
use tch::{nn::Path, Tensor};

/// Configuration for the [`Critic`] network.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticConfig {
    /// Sizes of the two layers of the state branch.
    pub state_hidden_sizes: [usize; 2],
    /// Size of the action branch layer.
    pub action_hidden_size: usize,
    /// Size of the layer applied to the concatenated branches.
    pub joint_hidden_size: usize,
    /// Configuration for the hidden layers
    pub hidden_layer: LinearConfig,
    /// Configuration for the output layer
    pub output_layer: LinearConfig,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            state_hidden_sizes: [256, 128],
            action_hidden_size: 128,
            joint_hidden_size: 128,
            hidden_layer: LinearConfig::default(),
            output_layer: LinearConfig::output_layer(),
        }
    }
}

impl CriticConfig {
    pub fn build(&self, vs: &Path, state_dim: usize, action_dim: usize) -> Critic {
        Critic::new(vs, state_dim, action_dim, self)
    }
}

/// State-action value network with outputs in `(0, 1)`.
///
/// The state and the action are projected by separate branches whose outputs are concatenated
/// and reduced to a single sigmoid unit.
#[derive(Debug)]
pub struct Critic {
    fcs1: Linear,
    fcs2: Linear,
    fca1: Linear,
    fc2: Linear,
    fc3: Linear,
}

impl Critic {
    pub fn new(vs: &Path, state_dim: usize, action_dim: usize, config: &CriticConfig) -> Self {
        let [s1, s2] = config.state_hidden_sizes;
        let hidden = &config.hidden_layer;
        Self {
            fcs1: Linear::new(&(vs / "fcs1"), state_dim, s1, hidden),
            fcs2: Linear::new(&(vs / "fcs2"), s1, s2, hidden),
            fca1: Linear::new(&(vs / "fca1"), action_dim, config.action_hidden_size, hidden),
            fc2: Linear::new(
                &(vs / "fc2"),
                s2 + config.action_hidden_size,
                config.joint_hidden_size,
                hidden,
            ),
            fc3: Linear::new(
                &(vs / "fc3"),
                config.joint_hidden_size,
                1,
                &config.output_layer,
            ),
        }
    }

    /// Value of a batch of state-action pairs.
    ///
    /// # Args
    /// * `state` - A tensor of shape `[BATCH_SIZE, STATE_DIM]`.
    /// * `action` - A tensor of shape `[BATCH_SIZE, ACTION_DIM]`.
    ///
    /// # Returns
    /// A tensor of shape `[BATCH_SIZE, 1]` with values in `(0, 1)`.
    pub fn forward(&self, state: &Tensor, action: &Tensor) -> Tensor {
        let s = self.fcs2.forward(&self.fcs1.forward(state).relu()).relu();
        let a = self.fca1.forward(action).relu();
        let x = Tensor::cat(&[s, a], 1);
        let x = self.fc2.forward(&x).relu();
        self.fc3.forward(&x).sigmoid()
    }
}

impl Module for Critic {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(
            [&self.fcs1, &self.fcs2, &self.fca1, &self.fc2, &self.fc3]
                .into_iter()
                .flat_map(Module::variables),
        )
    }
}
