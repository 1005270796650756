//! Tracking model
use super::{
    Actor, ActorConfig, Backbone, BackboneConfig, Critic, CriticConfig, FeatureExtractor,
    PolicyOutput, ACTION_DIM, ACTION_SPACE, BACKBONE_PREFIX, STATE_DIM,
};
use crate::error::TrackError;
use crate::logging::{Event, LogError, Loggable, Logger};
use crate::torch::modules::{BuildModule, HiddenState, IterativeModule, Lstm, LstmConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tch::{
    nn::{Path, VarStore},
    IndexOp, Kind, Tensor,
};

/// Forward pass mode of a [`TrackModel`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Single-step inference on a batch of independent episodes.
    Play,
    /// Unroll over the frames of one sequence and evaluate the critic.
    Train,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Play
    }
}

/// Configuration for [`TrackModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackModelConfig {
    /// Dimension of the frame embedding and of the recurrent state.
    pub state_dim: usize,
    /// Number of discrete actions.
    pub action_space: usize,
    /// Dimension of the action vector fed to the critic.
    pub action_dim: usize,
    pub backbone: BackboneConfig,
    /// Weights file of a standalone pretrained backbone to load at build time.
    pub pretrained_backbone: Option<PathBuf>,
    pub rnn: LstmConfig,
    pub actor: ActorConfig,
    pub critic: CriticConfig,
    /// Initial forward pass mode.
    pub mode: Mode,
}

impl Default for TrackModelConfig {
    fn default() -> Self {
        Self {
            state_dim: STATE_DIM,
            action_space: ACTION_SPACE,
            action_dim: ACTION_DIM,
            backbone: BackboneConfig::default(),
            pretrained_backbone: None,
            rnn: LstmConfig::default(),
            actor: ActorConfig::default(),
            critic: CriticConfig::default(),
            mode: Mode::default(),
        }
    }
}

impl TrackModelConfig {
    /// Build a model at the root of `vs` and load the pretrained backbone, if any.
    pub fn build(&self, vs: &VarStore) -> Result<TrackModel, TrackError> {
        let model = TrackModel::new(&vs.root(), self);
        if let Some(path) = &self.pretrained_backbone {
            self.backbone
                .load_pretrained(vs, BACKBONE_PREFIX, path)?;
        }
        Ok(model)
    }
}

/// Output of a [`Mode::Play`] forward pass.
#[derive(Debug)]
pub struct PlayOutput {
    /// Action distribution for each episode in the batch.
    pub policy: PolicyOutput,
    /// Recurrent state after this step.
    pub hidden: HiddenState,
}

/// Output of a [`Mode::Train`] forward pass.
#[derive(Debug)]
pub struct TrainOutput {
    /// Action distribution for each frame. Shape `[NUM_FRAMES, ACTION_SPACE]`.
    pub policy: PolicyOutput,
    /// Recurrent state after the last frame.
    pub hidden: HiddenState,
    /// Critic value of each frame and action. Shape `[NUM_FRAMES, 1]`.
    pub value: Tensor,
}

impl TrainOutput {
    /// Number of frames in the sequence.
    pub fn num_frames(&self) -> i64 {
        self.value.size()[0]
    }

    /// Log summary statistics of the pass as one [`Event::Sequence`].
    pub fn log_stats(&self, logger: &mut dyn Logger) -> Result<(), LogError> {
        let _no_grad = tch::no_grad_guard();
        let entropy = self.policy.distribution().entropy();
        logger.log(
            Event::Sequence,
            "seq_len",
            Loggable::Scalar(self.num_frames() as f64),
        )?;
        logger.log(
            Event::Sequence,
            "value_mean",
            f64::from(self.value.mean(Kind::Float)).into(),
        )?;
        logger.log(
            Event::Sequence,
            "entropy_mean",
            f64::from(entropy.mean(Kind::Float)).into(),
        )?;
        logger.done(Event::Sequence);
        Ok(())
    }
}

/// Output of [`TrackModel::forward`].
#[derive(Debug)]
pub enum ForwardOutput {
    Play(PlayOutput),
    Train(TrainOutput),
}

/// Recurrent actor-critic tracking model.
///
/// Variables are stored under `backbone`, `rnn`, `actor` and `critic`.
#[derive(Debug)]
pub struct TrackModel {
    backbone: Backbone,
    rnn: Lstm,
    actor: Actor,
    critic: Critic,
    action_space: usize,
    action_dim: usize,
    mode: Mode,
    training: bool,
}

impl TrackModel {
    pub fn new(vs: &Path, config: &TrackModelConfig) -> Self {
        let state_dim = config.state_dim;
        Self {
            backbone: config.backbone.build(&(vs / BACKBONE_PREFIX), state_dim),
            rnn: config.rnn.build_module(&(vs / "rnn"), state_dim, state_dim),
            actor: config
                .actor
                .build_module(&(vs / "actor"), state_dim, config.action_space),
            critic: config
                .critic
                .build(&(vs / "critic"), state_dim, config.action_dim),
            action_space: config.action_space,
            action_dim: config.action_dim,
            mode: config.mode,
            training: false,
        }
    }

    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Set the mode used by [`TrackModel::forward`].
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub const fn is_training(&self) -> bool {
        self.training
    }

    /// Set whether the backbone layers with train/eval behaviour (batch norm) use training mode.
    ///
    /// Defaults to false.
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub const fn action_space(&self) -> usize {
        self.action_space
    }

    pub const fn actor(&self) -> &Actor {
        &self.actor
    }

    pub const fn critic(&self) -> &Critic {
        &self.critic
    }

    /// Zero recurrent state for the start of `batch_size` new sequences.
    pub fn init_hidden_state(&self, batch_size: usize) -> HiddenState {
        self.rnn.initial_state(batch_size)
    }

    /// Forward pass in the current [`Mode`].
    ///
    /// `actions` are required in [`Mode::Train`] and ignored in [`Mode::Play`].
    pub fn forward(
        &self,
        images: &Tensor,
        actions: Option<&Tensor>,
        hidden: &HiddenState,
    ) -> Result<ForwardOutput, TrackError> {
        match self.mode {
            Mode::Play => self.play(images, hidden).map(ForwardOutput::Play),
            Mode::Train => {
                let actions = actions.ok_or(TrackError::MissingActions)?;
                self.train(images, actions, hidden)
                    .map(ForwardOutput::Train)
            }
        }
    }

    /// Advance a batch of independent episodes by one frame.
    ///
    /// # Args
    /// * `images` - The current frame of each episode. Shape `[BATCH_SIZE, C, H, W]`.
    /// * `hidden` - Recurrent state with batch size `BATCH_SIZE`.
    pub fn play(&self, images: &Tensor, hidden: &HiddenState) -> Result<PlayOutput, TrackError> {
        check_images(images)?;
        let batch_size = images.size()[0];
        self.check_hidden(hidden, batch_size)?;

        let mut state = hidden.shallow_clone();
        let output = self.encode(images, &mut state);
        Ok(PlayOutput {
            policy: self.actor.forward(&output),
            hidden: state,
        })
    }

    /// Unroll over the frames of one sequence and evaluate actor and critic on every frame.
    ///
    /// # Args
    /// * `images` - The frames in order. Shape `[NUM_FRAMES, C, H, W]`.
    /// * `actions` - Action taken at each frame. Shape `[NUM_FRAMES, ACTION_DIM]`.
    /// * `hidden` - Recurrent state before the first frame, with batch size 1.
    pub fn train(
        &self,
        images: &Tensor,
        actions: &Tensor,
        hidden: &HiddenState,
    ) -> Result<TrainOutput, TrackError> {
        check_images(images)?;
        let num_frames = images.size()[0];
        if num_frames == 0 {
            return Err(TrackError::EmptySequence);
        }
        self.check_hidden(hidden, 1)?;
        let expected_actions = vec![num_frames, self.action_dim as i64];
        if actions.size() != expected_actions {
            return Err(TrackError::ShapeMismatch {
                what: "actions",
                expected: format!("{:?}", expected_actions),
                actual: actions.size(),
            });
        }

        // Each frame depends on the state left by the previous one.
        let mut state = hidden.shallow_clone();
        let outputs: Vec<_> = (0..num_frames)
            .map(|i| self.encode(&images.i(i).unsqueeze(0), &mut state))
            .collect();
        let outputs = Tensor::cat(&outputs, 0);

        Ok(TrainOutput {
            policy: self.actor.forward(&outputs),
            hidden: state,
            value: self
                .critic
                .forward(&outputs, &actions.to_kind(Kind::Float)),
        })
    }

    /// Embed a batch of frames and advance the recurrent state by one step.
    fn encode(&self, images: &Tensor, state: &mut HiddenState) -> Tensor {
        let features = self.backbone.extract(images, self.training);
        self.rnn.step(state, &features)
    }

    fn check_hidden(&self, hidden: &HiddenState, batch_size: i64) -> Result<(), TrackError> {
        let expected = vec![
            self.rnn.num_layers() as i64,
            batch_size,
            self.rnn.hidden_size() as i64,
        ];
        match hidden.shape() {
            Some(shape) if shape == expected => Ok(()),
            shape => Err(TrackError::ShapeMismatch {
                what: "hidden state",
                expected: format!("{:?}", expected),
                actual: shape.unwrap_or_else(|| hidden.cell.size()),
            }),
        }
    }
}

fn check_images(images: &Tensor) -> Result<(), TrackError> {
    if images.dim() == 4 {
        Ok(())
    } else {
        Err(TrackError::ShapeMismatch {
            what: "images",
            expected: "[BATCH_SIZE, CHANNELS, HEIGHT, WIDTH]".into(),
            actual: images.size(),
        })
    }
}
