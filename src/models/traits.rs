use candle_core::{Result, Tensor};

use crate::datasets::GraphBatch;

/// A model producing one regression score per graph in a batch.
pub trait GraphRegressor {
    /// Returns a (num_graphs,) score tensor.
    fn forward_t(&self, batch: &GraphBatch, train: bool) -> Result<Tensor>;

    fn forward(&self, batch: &GraphBatch) -> Result<Tensor> {
        self.forward_t(batch, false)
    }

    /// L1 regression loss.
    fn loss(&self, scores: &Tensor, targets: &Tensor) -> Result<Tensor> {
        (scores - targets)?.abs()?.mean_all()
    }
}
