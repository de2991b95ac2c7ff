use candle_core::{bail, IndexOp, Result, Tensor};
use candle_nn::{batch_norm, ops, BatchNorm, BatchNormConfig, Dropout, Linear, Module, ModuleT,
    VarBuilder};

use super::gin::Mlp;
use super::utils::{linear, scatter_max, scatter_mean, scatter_sum, WeightMlp};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregator {
    Sum,
    Max,
    Mean,
}
impl Aggregator {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sum" => Ok(Self::Sum),
            "max" => Ok(Self::Max),
            "mean" => Ok(Self::Mean),
            _ => bail!("aggregator type {} not recognized", name),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct UnionSnnConvConfig {
    pub aggregator: Aggregator,
    pub dropout: f32,
    pub batch_norm: bool,
    pub residual: bool,
    pub init_eps: f64,
    pub learn_eps: bool,
    /// multiply messages by the learned edge weight (vs. a plain copy)
    pub weighted_messages: bool,
}
impl Default for UnionSnnConvConfig {
    fn default() -> Self {
        Self {
            aggregator: Aggregator::Sum,
            dropout: 0.0,
            batch_norm: true,
            residual: false,
            init_eps: 0.0,
            learn_eps: false,
            weighted_messages: true,
        }
    }
}

/// Message-passing layer attending over precomputed structural edge
/// weights.
///
/// Each edge's stored weight scalar runs through a small learned MLP; a
/// softmax over the flattened score tensor plus 1 yields strictly positive
/// multiplicative edge weights. Note the softmax deliberately spans the
/// whole batch's edge list, not per-destination neighborhoods, matching
/// the published model.
pub struct UnionSnnConv {
    lin: Linear,
    w_mlp: WeightMlp,
    apply_func: Option<Mlp>,
    aggregator: Aggregator,
    eps: Tensor,
    bn: BatchNorm,
    batch_norm: bool,
    residual: bool,
    dropout: Dropout,
    weighted_messages: bool,
}

impl UnionSnnConv {
    pub fn new(
        in_dim: usize,
        out_dim: usize,
        apply_func: Option<Mlp>,
        config: UnionSnnConvConfig,
        vs: VarBuilder,
    ) -> Result<Self> {
        // residual needs matching dims; silently disabled otherwise
        let residual = config.residual && in_dim == out_dim;
        let eps = if config.learn_eps {
            vs.get_with_hints((1,), "eps", candle_nn::Init::Const(config.init_eps))?
        } else {
            Tensor::new(&[config.init_eps as f32], vs.device())?
        };
        Ok(Self {
            lin: linear(in_dim, out_dim, vs.pp("lin"))?,
            w_mlp: WeightMlp::new(&[1, out_dim], 1, true, vs.pp("w_mlp"))?,
            apply_func,
            aggregator: config.aggregator,
            eps,
            bn: batch_norm(out_dim, BatchNormConfig::default(), vs.pp("bn"))?,
            batch_norm: config.batch_norm,
            residual,
            dropout: Dropout::new(config.dropout),
            weighted_messages: config.weighted_messages,
        })
    }

    /// `edge_weight` is the (E, 1) structural weight attached by
    /// preprocessing.
    pub fn forward_t(
        &self,
        x: &Tensor,
        edge_index: &Tensor,
        edge_weight: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let h_in = x;
        let num_nodes = x.dims2()?.0;
        let h = self.lin.forward(x)?;

        let scores = self.w_mlp.forward(edge_weight)?;
        let w = (ops::softmax(&scores.flatten_all()?, 0)? + 1.0)?.reshape(((), 1))?;

        let source = edge_index.i((0, ..))?;
        let messages = if self.weighted_messages {
            h.i(&source)?.broadcast_mul(&w)?
        } else {
            h.i(&source)?
        };
        let neigh = match self.aggregator {
            Aggregator::Sum => scatter_sum(&messages, edge_index, num_nodes)?,
            Aggregator::Max => scatter_max(&messages, edge_index, num_nodes)?,
            Aggregator::Mean => scatter_mean(&messages, edge_index, num_nodes)?,
        };
        let mut h = (h.broadcast_mul(&(1.0 + &self.eps)?)? + neigh)?;

        if let Some(apply_func) = &self.apply_func {
            h = apply_func.forward(&h)?;
        }
        if self.batch_norm {
            h = self.bn.forward_t(&h, train)?;
        }
        h = h.relu()?;
        if self.residual {
            h = (h_in + h)?;
        }
        self.dropout.forward(&h, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};

    fn vs() -> (VarMap, VarBuilder<'static>) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        (varmap, vb)
    }

    fn ring_batch() -> (Tensor, Tensor, Tensor) {
        let device = Device::Cpu;
        let x = Tensor::ones((4, 3), DType::F32, &device).unwrap();
        let pairs: [(u32, u32); 8] = [
            (0, 1),
            (1, 0),
            (1, 2),
            (2, 1),
            (2, 3),
            (3, 2),
            (3, 0),
            (0, 3),
        ];
        let mut flat: Vec<u32> = pairs.iter().map(|&(u, _)| u).collect();
        flat.extend(pairs.iter().map(|&(_, v)| v));
        let edge_index = Tensor::from_vec(flat, (2, 8), &device).unwrap();
        let edge_weight = Tensor::full(1.5f32, (8, 1), &device).unwrap();
        (x, edge_index, edge_weight)
    }

    #[test]
    fn unknown_aggregator_is_rejected() {
        assert!(Aggregator::from_name("bogus").is_err());
        assert_eq!(Aggregator::from_name("mean").unwrap(), Aggregator::Mean);
    }

    #[test]
    fn forward_produces_out_dim_features() {
        let (_varmap, vb) = vs();
        let conv = UnionSnnConv::new(3, 5, None, UnionSnnConvConfig::default(), vb).unwrap();
        let (x, edge_index, edge_weight) = ring_batch();
        let h = conv.forward_t(&x, &edge_index, &edge_weight, false).unwrap();
        assert_eq!(h.dims(), &[4, 5]);
    }

    #[test]
    fn residual_is_disabled_on_dim_mismatch() {
        let (_varmap, vb) = vs();
        let config = UnionSnnConvConfig {
            residual: true,
            ..Default::default()
        };
        let conv = UnionSnnConv::new(3, 5, None, config, vb).unwrap();
        assert!(!conv.residual);
        // forward still matches the configured out_dim
        let (x, edge_index, edge_weight) = ring_batch();
        let h = conv.forward_t(&x, &edge_index, &edge_weight, false).unwrap();
        assert_eq!(h.dims(), &[4, 5]);
    }

    #[test]
    fn residual_is_kept_on_matching_dims() {
        let (_varmap, vb) = vs();
        let config = UnionSnnConvConfig {
            residual: true,
            ..Default::default()
        };
        let conv = UnionSnnConv::new(3, 3, None, config, vb).unwrap();
        assert!(conv.residual);
    }

    #[test]
    fn aggregators_all_run() {
        for aggregator in [Aggregator::Sum, Aggregator::Max, Aggregator::Mean] {
            let (_varmap, vb) = vs();
            let config = UnionSnnConvConfig {
                aggregator,
                ..Default::default()
            };
            let conv = UnionSnnConv::new(3, 4, None, config, vb).unwrap();
            let (x, edge_index, edge_weight) = ring_batch();
            let h = conv.forward_t(&x, &edge_index, &edge_weight, true).unwrap();
            assert_eq!(h.dims(), &[4, 4]);
        }
    }
}
