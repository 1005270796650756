//! Long Short-Term Memory
use super::super::{BuildModule, Module};
use super::IterativeModule;
use crate::torch::initializers::Initializer;
use serde::{Deserialize, Serialize};
use tch::{nn::Path, Device, IndexOp, Kind, Tensor};

/// Configuration for [`Lstm`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LstmConfig {
    /// Number of stacked layers; each has size equal to the output size when built.
    pub num_layers: usize,
    /// Whether the layers include bias terms
    pub has_biases: bool,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            num_layers: 1,
            has_biases: true,
        }
    }
}

impl BuildModule for LstmConfig {
    type Module = Lstm;

    fn build_module(&self, vs: &Path, in_dim: usize, out_dim: usize) -> Self::Module {
        Lstm::new(vs, in_dim, out_dim, self)
    }
}

/// Recurrent memory of an [`Lstm`].
///
/// Both tensors have shape `[NUM_LAYERS, BATCH_SIZE, HIDDEN_SIZE]`.
#[derive(Debug, PartialEq)]
pub struct HiddenState {
    /// Hidden (output) state of each layer.
    pub hidden: Tensor,
    /// Cell state of each layer.
    pub cell: Tensor,
}

impl HiddenState {
    /// All-zero hidden state.
    pub fn zeros(num_layers: usize, batch_size: usize, hidden_size: usize, device: Device) -> Self {
        let shape = [num_layers as i64, batch_size as i64, hidden_size as i64];
        Self {
            hidden: Tensor::zeros(&shape, (Kind::Float, device)),
            cell: Tensor::zeros(&shape, (Kind::Float, device)),
        }
    }

    /// Shape shared by the hidden and cell tensors, if they agree.
    pub fn shape(&self) -> Option<Vec<i64>> {
        let shape = self.hidden.size();
        if shape == self.cell.size() {
            Some(shape)
        } else {
            None
        }
    }

    pub fn shallow_clone(&self) -> Self {
        Self {
            hidden: self.hidden.shallow_clone(),
            cell: self.cell.shallow_clone(),
        }
    }

    /// Copy of the state that is cut from the autograd graph.
    ///
    /// Gradients do not propagate into the steps that produced `self`.
    pub fn detach(&self) -> Self {
        Self {
            hidden: self.hidden.detach(),
            cell: self.cell.detach(),
        }
    }
}

/// Long Short-Term Memory Module
///
/// Weights follow the libtorch layout and naming (`weight_ih_l{i}`, `weight_hh_l{i}`,
/// `bias_ih_l{i}`, `bias_hh_l{i}`) with the input, forget, cell and output gates stacked along
/// the first dimension.
#[derive(Debug)]
pub struct Lstm {
    flat_weights: Vec<Tensor>,
    has_biases: bool,
    num_layers: usize,
    hidden_size: usize,
    device: Device,
}

impl Lstm {
    /// Create a new LSTM.
    ///
    /// All weights and biases are sampled from `Unif(±1 / √hidden_size)`, the libtorch default.
    pub fn new(vs: &Path, in_dim: usize, out_dim: usize, config: &LstmConfig) -> Self {
        let hidden_size = out_dim;
        let gates_size = 4 * hidden_size;
        let init = Initializer::FanInUniform;

        let mut flat_weights = Vec::new();
        for i in 0..config.num_layers {
            let layer_input_size = if i == 0 { in_dim } else { hidden_size };
            flat_weights.push(
                init.tensor(&[gates_size, layer_input_size])
                    .fan_in(hidden_size)
                    .add_to(vs, &format!("weight_ih_l{}", i)),
            );
            flat_weights.push(
                init.tensor(&[gates_size, hidden_size])
                    .fan_in(hidden_size)
                    .add_to(vs, &format!("weight_hh_l{}", i)),
            );
            if config.has_biases {
                flat_weights.push(
                    init.tensor(&[gates_size])
                        .fan_in(hidden_size)
                        .add_to(vs, &format!("bias_ih_l{}", i)),
                );
                flat_weights.push(
                    init.tensor(&[gates_size])
                        .fan_in(hidden_size)
                        .add_to(vs, &format!("bias_hh_l{}", i)),
                );
            }
        }
        Self {
            flat_weights,
            has_biases: config.has_biases,
            num_layers: config.num_layers,
            hidden_size,
            device: vs.device(),
        }
    }

    pub const fn num_layers(&self) -> usize {
        self.num_layers
    }

    pub const fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    const fn weights_per_layer(&self) -> usize {
        if self.has_biases {
            4
        } else {
            2
        }
    }

    fn layers(&self) -> impl Iterator<Item = LayerWeights<'_>> {
        let has_biases = self.has_biases;
        self.flat_weights
            .chunks_exact(self.weights_per_layer())
            .map(move |weights| LayerWeights {
                weights,
                has_biases,
            })
    }

    /// Apply the LSTM to a whole batch of sequences with a single fused call.
    ///
    /// # Args
    /// * `inputs` - A tensor of shape `[SEQ_LEN, BATCH_SIZE, NUM_INPUT_FEATURES]`.
    /// * `state` - Initial state with batch size `BATCH_SIZE`.
    ///
    /// # Returns
    /// * The outputs of the last layer, shape `[SEQ_LEN, BATCH_SIZE, HIDDEN_SIZE]`.
    /// * The final state.
    pub fn seq(&self, inputs: &Tensor, state: &HiddenState) -> (Tensor, HiddenState) {
        let initial_state = [state.hidden.shallow_clone(), state.cell.shallow_clone()];
        let (outputs, hidden, cell) = inputs.lstm(
            &initial_state,
            &self.flat_weights,
            self.has_biases,
            self.num_layers as i64,
            0.0,   // dropout
            true,  // train
            false, // bidirectional
            false, // batch_first
        );
        (outputs, HiddenState { hidden, cell })
    }
}

impl Module for Lstm {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.flat_weights.iter())
    }
}

impl IterativeModule for Lstm {
    type State = HiddenState;

    fn initial_state(&self, batch_size: usize) -> Self::State {
        HiddenState::zeros(self.num_layers, batch_size, self.hidden_size, self.device)
    }

    fn step(&self, state: &mut Self::State, input: &Tensor) -> Tensor {
        let mut layer_input = input.shallow_clone();
        let mut hiddens = Vec::with_capacity(self.num_layers);
        let mut cells = Vec::with_capacity(self.num_layers);
        for (i, w) in self.layers().enumerate() {
            let prev_hidden = state.hidden.i(i as i64);
            let prev_cell = state.cell.i(i as i64);
            let (hidden, cell) = layer_input.lstm_cell(
                &[&prev_hidden, &prev_cell],
                w.w_ih(),
                w.w_hh(),
                w.b_ih(),
                w.b_hh(),
            );
            layer_input = hidden.shallow_clone();
            hiddens.push(hidden);
            cells.push(cell);
        }
        *state = HiddenState {
            hidden: Tensor::stack(&hiddens, 0),
            cell: Tensor::stack(&cells, 0),
        };
        layer_input
    }
}

struct LayerWeights<'a> {
    weights: &'a [Tensor],
    has_biases: bool,
}

impl<'a> LayerWeights<'a> {
    const fn w_ih(&self) -> &Tensor {
        &self.weights[0]
    }

    const fn w_hh(&self) -> &Tensor {
        &self.weights[1]
    }

    const fn b_ih(&self) -> Option<&Tensor> {
        if self.has_biases {
            Some(&self.weights[2])
        } else {
            None
        }
    }

    const fn b_hh(&self) -> Option<&Tensor> {
        if self.has_biases {
            Some(&self.weights[3])
        } else {
            None
        }
    }
}
