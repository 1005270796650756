//! Categorical distribution
use tch::{Kind, Tensor};

/// Batch of categorical distributions over `0 .. NUM_EVENTS`.
#[derive(Debug)]
pub struct Categorical {
    /// Normalized log probabilities. Shape `[BATCH_SHAPE.., NUM_EVENTS]`, 32-bit float.
    logits: Tensor,
}

impl Categorical {
    /// Create from unnormalized log probabilities (scores) along the last dimension.
    pub fn new(logits: &Tensor) -> Self {
        Self {
            logits: logits.log_softmax(-1, Kind::Float),
        }
    }

    /// Normalized log probability of each event.
    pub const fn logits(&self) -> &Tensor {
        &self.logits
    }

    /// Probability of each event. Shape `[BATCH_SHAPE.., NUM_EVENTS]`.
    pub fn probs(&self) -> Tensor {
        self.logits.exp()
    }

    /// Draw one event index from each distribution. An i64 tensor of shape `[BATCH_SHAPE..]`.
    pub fn sample(&self) -> Tensor {
        let mut shape = self.logits.size();
        let num_events = shape.pop().unwrap_or(1);
        self.probs()
            .reshape(&[-1, num_events])
            .multinomial(1, true)
            .reshape(&shape)
    }

    /// Most probable event index of each distribution. Ties resolve to the lowest index.
    pub fn mode(&self) -> Tensor {
        self.logits.argmax(Some(-1), false)
    }

    /// Log probability of an i64 tensor of event indices with shape `[BATCH_SHAPE..]`.
    pub fn log_probs(&self, events: &Tensor) -> Tensor {
        self.logits
            .gather(-1, &events.unsqueeze(-1), false)
            .squeeze_dim(-1)
    }

    /// Entropy in nats. Shape `[BATCH_SHAPE..]`.
    pub fn entropy(&self) -> Tensor {
        // -inf * 0 would be NaN
        let finite_logits = self.logits.clamp_min(f64::from(f32::MIN));
        -(finite_logits * self.probs()).sum_dim_intlist(&[-1], false, Kind::Float)
    }
}
