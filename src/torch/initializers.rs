//! Tensor initializers
#![allow(clippy::use_self)] // false positive with serde derives
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tch::{nn::Path, Device, Kind, Tensor};
use thiserror::Error;

/// Bound of the uniform distribution used for the output layers of the actor and critic.
///
/// Small enough that the initial policy is close to uniform and the initial value is close to
/// `sigmoid(0) = 0.5`.
pub const FINAL_LAYER_BOUND: f64 = 0.003;

/// Tensor initializers.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    /// Initialize to all zeros
    Zeros,
    /// Initialize all elements to the given constant value.
    Constant(f64),
    /// Sample from `Unif(±1 / √fan_in)`.
    ///
    /// The fan-in defaults to the size of the first tensor dimension.
    FanInUniform,
    /// Sample from `Unif(±bound)` for the given bound.
    Uniform(f64),
}

/// Defaults to `FanInUniform`.
impl Default for Initializer {
    fn default() -> Self {
        Self::FanInUniform
    }
}

impl Initializer {
    /// Start building a new [`Tensor`] using this initializer.
    ///
    /// See the [`TensorBuilder`] methods for more configuration options.
    #[must_use]
    #[inline]
    pub const fn tensor<'a>(&'a self, shape: &'a [usize]) -> TensorBuilder<'a> {
        TensorBuilder::new(self, shape)
    }
}

/// Fan-in of a tensor shape: the size of the first dimension or 1 for a scalar.
fn default_fan_in(shape: &[usize]) -> usize {
    shape.first().copied().unwrap_or(1)
}

/// Builder for initializing a new tensor.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TensorBuilder<'a> {
    initializer: &'a Initializer,
    shape: &'a [usize],
    fan_in: Option<usize>,
    requires_grad: bool,
    kind: Kind,
    device: Device,
}

impl<'a> TensorBuilder<'a> {
    #[must_use]
    #[inline]
    pub const fn new(initializer: &'a Initializer, shape: &'a [usize]) -> Self {
        Self {
            initializer,
            shape,
            fan_in: None,
            requires_grad: true,
            kind: Kind::Float,
            device: Device::Cpu,
        }
    }

    /// Sampling bound of the uniform initializers. `None` for the others.
    pub fn bound(&self) -> Option<f64> {
        match self.initializer {
            Initializer::FanInUniform => {
                let fan_in = self.fan_in.unwrap_or_else(|| default_fan_in(self.shape));
                Some((fan_in.max(1) as f64).sqrt().recip())
            }
            Initializer::Uniform(bound) => Some(*bound),
            Initializer::Zeros | Initializer::Constant(_) => None,
        }
    }

    /// Build the [`Tensor`].
    pub fn build(&self) -> Tensor {
        let tensor = self.build_detached();
        tensor.set_requires_grad(self.requires_grad)
    }

    fn build_detached(&self) -> Tensor {
        let options = (self.kind, self.device);
        let shape_i64: SmallVec<[i64; 8]> = self.shape.iter().map(|&d| d as i64).collect();

        let _no_grad = tch::no_grad_guard();
        match (self.initializer, self.bound()) {
            (Initializer::Zeros, _) => Tensor::zeros(&shape_i64, options),
            (Initializer::Constant(v), _) => Tensor::full(&shape_i64, *v, options),
            (_, Some(lim)) => Tensor::empty(&shape_i64, options).uniform_(-lim, lim),
            (_, None) => unreachable!("uniform initializers always have a bound"),
        }
    }

    /// Build the tensor and register it as a variable named `name` in `path`.
    ///
    /// The variable is trainable if `requires_grad` is set (the default).
    /// The `device` is taken from `path`.
    pub fn add_to(self, path: &Path, name: &str) -> Tensor {
        let builder = self.device(path.device());
        let value = builder.build_detached();
        let var = path.var_copy(name, &value);
        if builder.requires_grad {
            var
        } else {
            var.set_requires_grad(false)
        }
    }

    /// Override the `fan_in` value (number of input features) taken from `shape`.
    ///
    /// A layer bias usually shares the fan-in of its weights, which cannot be read off the
    /// bias shape.
    #[must_use]
    #[inline]
    pub const fn fan_in(mut self, fan_in: usize) -> Self {
        self.fan_in = Some(fan_in);
        self
    }

    /// Set whether the tensor requires gradient tracking. Defaults to true.
    #[must_use]
    #[inline]
    pub const fn requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    /// Set the data type [`Kind`] of the tensor to build. Defaults to 32-bit float.
    ///
    /// Only floating-point kinds are allowed.
    #[inline]
    pub const fn kind(mut self, kind: Kind) -> Result<Self, InitializeTensorError> {
        use Kind::*;
        match kind {
            Half | Float | Double | BFloat16 => {}
            _ => return Err(InitializeTensorError::InvalidKind(kind)),
        }
        self.kind = kind;
        Ok(self)
    }

    /// Set the [`Device`] on which the tensor will be created. Defaults to CPU.
    #[must_use]
    #[inline]
    pub const fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }
}

/// Error initializing a [`Tensor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum InitializeTensorError {
    #[error("unsupported kind {0:?}; expected a floating-point type")]
    InvalidKind(Kind),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tch::nn::VarStore;

    #[rstest]
    #[case::zeros(Initializer::Zeros, 0.0)]
    #[case::constant(Initializer::Constant(-1.5), -1.5)]
    fn fills_constant(#[case] init: Initializer, #[case] value: f64) {
        let t = init.tensor(&[4, 3]).build();
        assert_eq!(t, Tensor::full(&[4, 3], value, (Kind::Float, Device::Cpu)));
    }

    #[rstest]
    #[case(&[4, 100], 0.5)]
    #[case(&[100, 4], 0.1)]
    #[case(&[256, 256], 0.0625)]
    fn fan_in_from_first_dim(#[case] shape: &[usize], #[case] bound: f64) {
        let t = Initializer::FanInUniform.tensor(shape).build();
        assert_eq!(t.size(), shape.iter().map(|&d| d as i64).collect::<Vec<_>>());
        let max = f64::from(t.abs().max());
        assert!(max <= bound, "{max:?}");
        // 400+ uniform draws land in the outer quarter almost surely
        assert!(max >= 0.75 * bound, "{max:?}");
    }

    #[test]
    fn fan_in_override_widens_bound() {
        let t = Initializer::FanInUniform.tensor(&[100, 4]).fan_in(1).build();
        let max = f64::from(t.abs().max());
        assert!((0.75..=1.0).contains(&max), "{max:?}");
    }

    #[rstest]
    #[case(Initializer::FanInUniform, &[16, 3], None, Some(0.25))]
    #[case(Initializer::FanInUniform, &[16, 3], Some(4), Some(0.5))]
    #[case(Initializer::FanInUniform, &[], None, Some(1.0))]
    #[case(Initializer::Uniform(FINAL_LAYER_BOUND), &[64], None, Some(FINAL_LAYER_BOUND))]
    #[case(Initializer::Zeros, &[16, 3], None, None)]
    fn bound(
        #[case] init: Initializer,
        #[case] shape: &[usize],
        #[case] fan_in: Option<usize>,
        #[case] expected: Option<f64>,
    ) {
        let builder = init.tensor(shape);
        let builder = match fan_in {
            Some(f) => builder.fan_in(f),
            None => builder,
        };
        assert_eq!(builder.bound(), expected);
    }

    #[test]
    fn final_layer_values() {
        let t = Initializer::Uniform(FINAL_LAYER_BOUND).tensor(&[2, 64]).build();
        let max = f64::from(t.abs().max());
        assert!(max <= FINAL_LAYER_BOUND && max > 0.0, "{max:?}");
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn requires_grad_flag(#[case] requires_grad: bool) {
        let t = Initializer::default()
            .tensor(&[3])
            .requires_grad(requires_grad)
            .build();
        assert_eq!(t.requires_grad(), requires_grad);
    }

    #[rstest]
    #[case(Kind::Float)]
    #[case(Kind::Double)]
    fn float_kinds(#[case] kind: Kind) {
        let t = Initializer::default().tensor(&[3]).kind(kind).unwrap().build();
        assert_eq!(t.kind(), kind);
    }

    #[rstest]
    #[case(Kind::Int64)]
    #[case(Kind::Bool)]
    fn non_float_kind_rejected(#[case] kind: Kind) {
        let initializer = Initializer::default();
        let result = initializer.tensor(&[3]).kind(kind);
        assert_eq!(result.err(), Some(InitializeTensorError::InvalidKind(kind)));
    }

    #[test]
    fn builds_on_device() {
        let device = Device::cuda_if_available();
        let t = Initializer::Zeros.tensor(&[3]).device(device).build();
        assert_eq!(t.device(), device);
    }

    #[test]
    fn add_to_registers_trainable_variable() {
        let vs = VarStore::new(Device::Cpu);
        let _ = Initializer::Constant(1.5)
            .tensor(&[3, 2])
            .add_to(&(&vs.root() / "layer"), "weight");
        let variables = vs.variables();
        let var = &variables["layer.weight"];
        assert!(var.requires_grad());
        assert_eq!(vs.trainable_variables().len(), 1);
        assert_eq!(*var, Tensor::full(&[3, 2], 1.5, (Kind::Float, Device::Cpu)));
    }

    #[test]
    fn add_to_frozen_variable() {
        let vs = VarStore::new(Device::Cpu);
        let var = Initializer::Zeros
            .tensor(&[2])
            .requires_grad(false)
            .add_to(&vs.root(), "frozen");
        assert!(!var.requires_grad());
    }
}
