//! Recurrent actor-critic tracking model
//!
//! Each frame is embedded by a [backbone](Backbone), the embeddings of consecutive frames are
//! encoded by an [LSTM](crate::torch::modules::Lstm), and the recurrent output drives an
//! [`Actor`] (policy over discrete tracking actions) and a [`Critic`] (value of a state-action
//! pair).
mod actor;
mod agent;
mod backbone;
mod critic;
mod tracker;

pub use actor::{Actor, ActorConfig, PolicyOutput};
pub use agent::TrackActor;
pub use backbone::{Backbone, BackboneConfig, FeatureExtractor};
pub use critic::{Critic, CriticConfig};
pub use tracker::{ForwardOutput, Mode, PlayOutput, TrackModel, TrackModelConfig, TrainOutput};

/// Dimension of the per-frame state embedding and of the recurrent hidden state.
pub const STATE_DIM: usize = 256;
/// Number of discrete actions.
pub const ACTION_SPACE: usize = 2;
/// Dimension of the action vector fed to the critic.
pub const ACTION_DIM: usize = 1;
/// Variable store path prefix of the backbone variables.
pub const BACKBONE_PREFIX: &str = "backbone";
