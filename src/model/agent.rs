//! Stateful tracking actor
use super::TrackModel;
use crate::error::TrackError;
use crate::logging::{Event, Loggable, Logger};
use crate::torch::modules::HiddenState;
use tch::Tensor;

/// Acts in a single tracking episode by stepping a [`TrackModel`] in play mode.
///
/// Owns the recurrent state between frames.
#[derive(Debug)]
pub struct TrackActor<'a> {
    model: &'a TrackModel,
    hidden: HiddenState,
    greedy: bool,
}

impl<'a> TrackActor<'a> {
    /// Create an actor at the start of an episode.
    ///
    /// If `greedy` then the most probable action is taken, otherwise actions are sampled.
    pub fn new(model: &'a TrackModel, greedy: bool) -> Self {
        Self {
            model,
            hidden: model.init_hidden_state(1),
            greedy,
        }
    }

    /// Reset the recurrent state for the start of a new episode.
    pub fn reset(&mut self) {
        self.hidden = self.model.init_hidden_state(1);
    }

    pub const fn hidden_state(&self) -> &HiddenState {
        &self.hidden
    }

    /// Select an action for the next frame of the episode.
    ///
    /// # Args
    /// * `image` - The frame. Shape `[C, H, W]` or `[1, C, H, W]`.
    /// * `logger` - Logs the selected action as an [`Event::Step`].
    pub fn act(&mut self, image: &Tensor, logger: &mut dyn Logger) -> Result<usize, TrackError> {
        let _no_grad = tch::no_grad_guard();
        let images = if image.dim() == 3 {
            image.unsqueeze(0)
        } else {
            image.shallow_clone()
        };
        let output = self.model.play(&images, &self.hidden)?;
        let distribution = output.policy.distribution();
        let action = if self.greedy {
            distribution.mode()
        } else {
            distribution.sample()
        };
        let action = action.int64_value(&[0]) as usize;

        logger.log(
            Event::Step,
            "action",
            Loggable::IndexSample {
                value: action,
                size: self.model.action_space(),
            },
        )?;
        logger.done(Event::Step);
        self.hidden = output.hidden;
        Ok(action)
    }
}
