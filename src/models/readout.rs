use candle_core::{DType, Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

use crate::nn::utils::linear;

/// Mean of node embeddings per graph id; graphs with no nodes cannot occur
/// in a batch, but empty counts are clamped anyway to keep the division
/// finite.
pub fn mean_nodes(h: &Tensor, graph_ids: &Tensor, num_graphs: usize) -> Result<Tensor> {
    let (_, dim) = h.dims2()?;
    let sums = Tensor::zeros((num_graphs, dim), h.dtype(), h.device())?
        .index_add(graph_ids, h, 0)?;
    let counts = Tensor::zeros(num_graphs, DType::U32, h.device())?
        .index_add(graph_ids, &graph_ids.ones_like()?, 0)?
        .maximum(1u32)?
        .to_dtype(h.dtype())?
        .reshape((num_graphs, 1))?;
    sums.broadcast_div(&counts)
}

/// Halving MLP head: input_dim -> input_dim/2 -> input_dim/4 -> 1 with
/// ReLU between layers and a linear output.
pub struct MlpReadout {
    layers: Vec<Linear>,
    out: Linear,
}
impl MlpReadout {
    const NUM_HALVINGS: usize = 2;

    pub fn new(input_dim: usize, vs: VarBuilder) -> Result<Self> {
        let mut layers = Vec::new();
        let mut dim = input_dim;
        for i in 0..Self::NUM_HALVINGS {
            layers.push(linear(dim, dim / 2, vs.pp(format!("fc{}", i)))?);
            dim /= 2;
        }
        let out = linear(dim, 1, vs.pp("out"))?;
        Ok(Self { layers, out })
    }
}
impl Module for MlpReadout {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut h = xs.clone();
        for fc in &self.layers {
            h = fc.forward(&h)?.relu()?;
        }
        self.out.forward(&h)
    }
}
