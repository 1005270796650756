//! Shared checks for module tests.
use super::{BuildModule, FeedForwardModule, IterativeModule};
use tch::{
    nn::{OptimizerConfig, Sgd, VarStore},
    Device, Kind, Tensor,
};

fn shape_with_features(batch_shape: &[usize], num_features: usize) -> Vec<i64> {
    batch_shape
        .iter()
        .chain(Some(&num_features))
        .map(|&d| d as i64)
        .collect()
}

/// Check the output shape of [`FeedForwardModule::forward`] for a batch of inputs.
pub fn check_forward<M: FeedForwardModule>(
    module: &M,
    in_dim: usize,
    out_dim: usize,
    batch_shape: &[usize],
) {
    let _no_grad = tch::no_grad_guard();
    let input = Tensor::rand(
        &shape_with_features(batch_shape, in_dim),
        (Kind::Float, Device::Cpu),
    );
    let output = module.forward(&input);
    assert_eq!(output.size(), shape_with_features(batch_shape, out_dim));
}

/// Check [`IterativeModule::step`] over a few steps.
///
/// Every output has the right shape and the state left by one step is accepted by the next.
pub fn check_step<M: IterativeModule>(module: &M, in_dim: usize, out_dim: usize) {
    let _no_grad = tch::no_grad_guard();
    let batch_size = 3;
    let mut state = module.initial_state(batch_size);
    for _ in 0..3 {
        let input = Tensor::randn(
            &[batch_size as i64, in_dim as i64],
            (Kind::Float, Device::Cpu),
        );
        let output = module.step(&mut state, &input);
        assert_eq!(output.size(), [batch_size as i64, out_dim as i64]);
    }
}

/// Check that one gradient descent step on a regression loss lowers the loss.
pub fn check_gradient_step<C>(config: &C)
where
    C: BuildModule,
    C::Module: FeedForwardModule,
{
    let (in_dim, out_dim) = (4, 16);
    let options = (Kind::Float, Device::Cpu);
    let input = Tensor::randn(&[8, in_dim], options);
    let target = Tensor::randn(&[8, out_dim], options);

    let vs = VarStore::new(Device::Cpu);
    let module = config.build_module(&vs.root(), in_dim as usize, out_dim as usize);
    let mut optimizer = Sgd::default().build(&vs, 0.01).unwrap();
    let loss = |m: &C::Module| (m.forward(&input) - &target).square().mean(Kind::Float);

    let initial_loss = loss(&module);
    optimizer.backward_step(&initial_loss);
    let final_loss = loss(&module);
    assert!(final_loss.double_value(&[]) < initial_loss.double_value(&[]));
}

/// Check that all elements of `tensor` lie within `[-bound, bound]`.
pub fn check_abs_bound(tensor: &Tensor, bound: f64) {
    let max = f64::from(tensor.abs().max());
    assert!(max <= bound, "max |x| = {max} > {bound}");
}

/// Assert that two tensors are elementwise close.
pub fn assert_allclose(actual: &Tensor, expected: &Tensor) {
    assert!(
        actual.allclose(expected, 1e-5, 1e-6, false),
        "{actual:?} != {expected:?}"
    );
}
