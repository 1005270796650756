//! Feed-forward modules
mod activation;
mod linear;

pub use activation::Activation;
pub use linear::{Linear, LinearConfig};
