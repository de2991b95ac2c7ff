use candle_core::{Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

use super::readout::{mean_nodes, MlpReadout};
use super::traits::GraphRegressor;
use super::unionsnn::NetParams;
use crate::datasets::GraphBatch;
use crate::nn::utils::linear;
use crate::nn::{GinConv, GnnModule, Mlp};

/// GIN baseline for graph regression.
pub struct GinNet {
    embedding: Linear,
    layers: Vec<GinConv>,
    readout: MlpReadout,
}

impl GinNet {
    pub fn new(params: NetParams, vs: VarBuilder) -> Result<Self> {
        let hidden = params.hidden_dim;
        let mut layers = Vec::with_capacity(params.n_layers);
        for i in 0..params.n_layers {
            let vs = vs.pp(format!("layer_{}", i));
            let mlp = Mlp::new(hidden, hidden, hidden, vs.pp("mlp"))?;
            layers.push(GinConv::new(mlp, vs)?);
        }
        Ok(Self {
            embedding: linear(params.in_dim, hidden, vs.pp("embedding"))?,
            layers,
            readout: MlpReadout::new(hidden, vs.pp("readout"))?,
        })
    }
}

impl GraphRegressor for GinNet {
    fn forward_t(&self, batch: &GraphBatch, train: bool) -> Result<Tensor> {
        let mut h = self.embedding.forward(&batch.xs)?;
        for layer in &self.layers {
            h = layer.forward_t(&h, &batch.edge_index, train)?.relu()?;
        }
        let pooled = mean_nodes(&h, &batch.graph_ids, batch.num_graphs)?;
        self.readout.forward(&pooled)?.squeeze(1)
    }
}
