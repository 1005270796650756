//! Recurrent actor-critic model for visual object tracking.
//!
//! A [backbone](model::Backbone) embeds each video frame, an LSTM carries the embeddings of
//! consecutive frames forward in time, and its output drives a policy ([`model::Actor`]) over
//! discrete tracking actions and a state-action value estimate ([`model::Critic`]).
//!
//! ```no_run
//! use tch::{nn::VarStore, Device, Kind, Tensor};
//! use tracklearn::{TrackModelConfig, TrackActor};
//!
//! let vs = VarStore::new(Device::cuda_if_available());
//! let model = TrackModelConfig::default().build(&vs).unwrap();
//! let mut actor = TrackActor::new(&model, false);
//! let frame = Tensor::rand(&[3, 224, 224], (Kind::Float, vs.device()));
//! let action = actor.act(&frame, &mut ()).unwrap();
//! ```
#![warn(clippy::cast_lossless)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)] // also triggered by macro expansions
mod error;
pub mod logging;
pub mod model;
pub mod torch;

pub use error::TrackError;
pub use model::{
    ForwardOutput, Mode, PlayOutput, TrackActor, TrackModel, TrackModelConfig, TrainOutput,
};
