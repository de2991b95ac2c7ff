use candle_core::{bail, Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

use super::readout::{mean_nodes, MlpReadout};
use super::traits::GraphRegressor;
use crate::datasets::GraphBatch;
use crate::nn::utils::linear;
use crate::nn::{Aggregator, Mlp, UnionSnnConv, UnionSnnConvConfig};

/// Shared hyperparameters for the graph-regression nets.
#[derive(Clone, Copy, Debug)]
pub struct NetParams {
    pub in_dim: usize,
    pub hidden_dim: usize,
    pub n_layers: usize,
    pub dropout: f32,
    pub batch_norm: bool,
    pub residual: bool,
    pub learn_eps: bool,
    pub aggregator: Aggregator,
}
impl NetParams {
    pub fn new(in_dim: usize) -> Self {
        Self {
            in_dim,
            hidden_dim: 64,
            n_layers: 4,
            dropout: 0.0,
            batch_norm: true,
            residual: true,
            learn_eps: false,
            aggregator: Aggregator::Sum,
        }
    }
}

/// Input embedding, a stack of [`UnionSnnConv`] layers consuming the
/// precomputed structural edge weights, mean readout, MLP head.
pub struct UnionSnnNet {
    embedding: Linear,
    layers: Vec<UnionSnnConv>,
    readout: MlpReadout,
}

impl UnionSnnNet {
    pub fn new(params: NetParams, vs: VarBuilder) -> Result<Self> {
        let hidden = params.hidden_dim;
        let config = UnionSnnConvConfig {
            aggregator: params.aggregator,
            dropout: params.dropout,
            batch_norm: params.batch_norm,
            residual: params.residual,
            learn_eps: params.learn_eps,
            ..Default::default()
        };
        let mut layers = Vec::with_capacity(params.n_layers);
        for i in 0..params.n_layers {
            let vs = vs.pp(format!("layer_{}", i));
            let apply_func = Mlp::new(hidden, hidden, hidden, vs.pp("apply"))?;
            layers.push(UnionSnnConv::new(hidden, hidden, Some(apply_func), config, vs)?);
        }
        Ok(Self {
            embedding: linear(params.in_dim, hidden, vs.pp("embedding"))?,
            layers,
            readout: MlpReadout::new(hidden, vs.pp("readout"))?,
        })
    }
}

impl GraphRegressor for UnionSnnNet {
    fn forward_t(&self, batch: &GraphBatch, train: bool) -> Result<Tensor> {
        let Some(edge_weight) = batch.edge_weight.as_ref() else {
            bail!("graph batch carries no structural edge weights; run the shortest-path preprocessing first")
        };
        let mut h = self.embedding.forward(&batch.xs)?;
        for layer in &self.layers {
            h = layer.forward_t(&h, &batch.edge_index, edge_weight, train)?;
        }
        let pooled = mean_nodes(&h, &batch.graph_ids, batch.num_graphs)?;
        self.readout.forward(&pooled)?.squeeze(1)
    }
}
