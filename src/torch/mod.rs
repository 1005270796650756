//! Torch components
pub mod distributions;
pub mod initializers;
pub mod modules;

pub use initializers::{Initializer, FINAL_LAYER_BOUND};
pub use modules::{Activation, BuildModule, FeedForwardModule, Module};
