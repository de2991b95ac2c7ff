use candle_core::{IndexOp, Result, Tensor};
use candle_nn::{Init, VarBuilder};

use super::{
    traits::GnnModule,
    utils::{in_degree, out_degree, weighted_sum_agg},
};

/// Symmetric-normalized graph convolution, the plain baseline next to
/// [`super::UnionSnnConv`].
pub struct GcnConv {
    weight: Tensor,
    bias: Tensor,
}
impl GcnConv {
    pub fn new(in_dim: usize, out_dim: usize, vs: VarBuilder) -> Result<Self> {
        // Xavier Uniform
        let bound = (6.0 / (in_dim + out_dim) as f64).sqrt();
        let weight = vs.get_with_hints(
            (in_dim, out_dim),
            "weight",
            Init::Uniform {
                lo: -bound,
                up: bound,
            },
        )?;
        let bias = vs.get_with_hints((1, out_dim), "bias", Init::Const(0.0))?;
        Ok(Self { weight, bias })
    }
}
impl GnnModule for GcnConv {
    fn forward_t(&self, xs: &Tensor, edge_index: &Tensor, _train: bool) -> Result<Tensor> {
        let num_nodes = xs.dims2()?.0;
        let out_degree = out_degree(edge_index, num_nodes)?.maximum(1u32)?;
        let in_degree = in_degree(edge_index, num_nodes)?.maximum(1u32)?;
        let edge_weight = out_degree
            .i(&edge_index.i((0, ..))?)?
            .mul(&in_degree.i(&edge_index.i((1, ..))?)?)?
            .to_dtype(xs.dtype())?
            .powf(-0.5)?;
        let xs = xs.matmul(&self.weight)?;
        weighted_sum_agg(&xs, edge_index, &edge_weight, &xs)?.broadcast_add(&self.bias)
    }
}
