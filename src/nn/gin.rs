use candle_core::{IndexOp, Result, Tensor};
use candle_nn::{Activation, Init, Linear, Module, VarBuilder};

use super::traits::GnnModule;
use super::utils::linear;

/// Two-layer MLP with linear output, the apply-function used by GIN and
/// UnionSNN layers.
pub struct Mlp {
    fc1: Linear,
    activation_fn: Activation,
    fc2: Linear,
}
impl Mlp {
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        output_dim: usize,
        vs: VarBuilder,
    ) -> Result<Self> {
        Ok(Self {
            fc1: linear(input_dim, hidden_dim, vs.pp("fc1"))?,
            activation_fn: Activation::Relu,
            fc2: linear(hidden_dim, output_dim, vs.pp("fc2"))?,
        })
    }
}
impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.apply(&self.fc1)?
            .apply(&self.activation_fn)?
            .apply(&self.fc2)
    }
}

pub struct GinConv {
    nn: Mlp,
    eps: Tensor,
}
impl GinConv {
    pub fn new(nn: Mlp, vs: VarBuilder) -> Result<Self> {
        Ok(Self {
            nn,
            eps: vs.get_with_hints((1,), "eps", Init::Const(0.0))?,
        })
    }
}
impl GnnModule for GinConv {
    fn forward_t(&self, x: &Tensor, edge_index: &Tensor, _train: bool) -> Result<Tensor> {
        let x = x.broadcast_mul(&(1.0 + &self.eps)?)?.index_add(
            &edge_index.i((1, ..))?,
            &x.i(&edge_index.i((0, ..))?)?,
            0,
        )?;
        self.nn.forward(&x)
    }
}
