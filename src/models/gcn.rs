use candle_core::{Result, Tensor};
use candle_nn::{Dropout, Linear, Module, VarBuilder};

use super::readout::{mean_nodes, MlpReadout};
use super::traits::GraphRegressor;
use super::unionsnn::NetParams;
use crate::datasets::GraphBatch;
use crate::nn::utils::linear;
use crate::nn::{GcnConv, GnnModule};

/// GCN baseline for graph regression; ignores structural edge weights.
pub struct GcnNet {
    embedding: Linear,
    layers: Vec<GcnConv>,
    dropout: Dropout,
    readout: MlpReadout,
}

impl GcnNet {
    pub fn new(params: NetParams, vs: VarBuilder) -> Result<Self> {
        let hidden = params.hidden_dim;
        let mut layers = Vec::with_capacity(params.n_layers);
        for i in 0..params.n_layers {
            layers.push(GcnConv::new(hidden, hidden, vs.pp(format!("layer_{}", i)))?);
        }
        Ok(Self {
            embedding: linear(params.in_dim, hidden, vs.pp("embedding"))?,
            layers,
            dropout: Dropout::new(params.dropout),
            readout: MlpReadout::new(hidden, vs.pp("readout"))?,
        })
    }
}

impl GraphRegressor for GcnNet {
    fn forward_t(&self, batch: &GraphBatch, train: bool) -> Result<Tensor> {
        let mut h = self.embedding.forward(&batch.xs)?;
        for layer in &self.layers {
            h = layer.forward_t(&h, &batch.edge_index, train)?.relu()?;
            h = self.dropout.forward(&h, train)?;
        }
        let pooled = mean_nodes(&h, &batch.graph_ids, batch.num_graphs)?;
        self.readout.forward(&pooled)?.squeeze(1)
    }
}
