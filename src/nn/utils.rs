use candle_core::{DType, IndexOp, Result, Tensor};
use candle_nn::{Activation, Init, Linear, Module, VarBuilder};

// Edge convention throughout the crate: edge_index is a (2, E) u32 tensor,
// row 0 holds sources, row 1 holds targets; messages flow from source to
// target and are aggregated at the target.

pub fn out_degree(edge_index: &Tensor, num_nodes: usize) -> Result<Tensor> {
    degree(edge_index, num_nodes, 0)
}

pub fn in_degree(edge_index: &Tensor, num_nodes: usize) -> Result<Tensor> {
    degree(edge_index, num_nodes, 1)
}

fn degree(edge_index: &Tensor, num_nodes: usize, row: usize) -> Result<Tensor> {
    let endpoints = edge_index.i((row, ..))?;
    Tensor::zeros(num_nodes, DType::U32, edge_index.device())?
        .index_add(&endpoints, &endpoints.ones_like()?, 0)
}

/// `init + Σ_e w_e * xs[source_e]` accumulated at each target node.
pub fn weighted_sum_agg(
    xs: &Tensor,
    edge_index: &Tensor,
    edge_weight: &Tensor,
    init: &Tensor,
) -> Result<Tensor> {
    let source = edge_index.i((0, ..))?;
    let target = edge_index.i((1, ..))?;
    let messages = xs.i(&source)?.broadcast_mul(&edge_weight.reshape(((), 1))?)?;
    init.index_add(&target, &messages, 0)
}

/// Sum of per-edge messages (E, D) at each target node, yielding (N, D).
pub fn scatter_sum(messages: &Tensor, edge_index: &Tensor, num_nodes: usize) -> Result<Tensor> {
    let target = edge_index.i((1, ..))?;
    let (_, dim) = messages.dims2()?;
    Tensor::zeros((num_nodes, dim), messages.dtype(), messages.device())?
        .index_add(&target, messages, 0)
}

pub fn scatter_mean(messages: &Tensor, edge_index: &Tensor, num_nodes: usize) -> Result<Tensor> {
    let summed = scatter_sum(messages, edge_index, num_nodes)?;
    let counts = in_degree(edge_index, num_nodes)?
        .maximum(1u32)?
        .to_dtype(messages.dtype())?
        .reshape((num_nodes, 1))?;
    summed.broadcast_div(&counts)
}

/// Elementwise max of incoming messages per target node. Nodes with no
/// incoming edges get zeros. Gradients flow through the selected entries
/// via `index_select` + `max`.
pub fn scatter_max(messages: &Tensor, edge_index: &Tensor, num_nodes: usize) -> Result<Tensor> {
    let target: Vec<u32> = edge_index.i((1, ..))?.to_vec1()?;
    let (_, dim) = messages.dims2()?;
    let mut incoming = vec![Vec::new(); num_nodes];
    for (edge, &node) in target.iter().enumerate() {
        incoming[node as usize].push(edge as u32);
    }
    let mut rows = Vec::with_capacity(num_nodes);
    for edges in incoming {
        if edges.is_empty() {
            rows.push(Tensor::zeros(dim, messages.dtype(), messages.device())?);
        } else {
            let count = edges.len();
            let index = Tensor::from_vec(edges, count, messages.device())?;
            rows.push(messages.index_select(&index, 0)?.max(0)?);
        }
    }
    Tensor::stack(&rows, 0)
}

//
// Linear layers with torch-equivalent initialisation
//
//   torch.nn.Linear is initialised by Uniform(-1/sqrt(fan_in), 1/sqrt(fan_in)).
//   see https://github.com/pytorch/pytorch/issues/57109
//
pub fn linear(in_dim: usize, out_dim: usize, vs: VarBuilder) -> Result<Linear> {
    let bound = 1.0 / (in_dim as f64).sqrt();
    let init_ws = Init::Uniform {
        lo: -bound,
        up: bound,
    };
    let init_bs = Init::Uniform {
        lo: -bound,
        up: bound,
    };
    let ws = vs.get_with_hints((out_dim, in_dim), "weight", init_ws)?;
    let bs = vs.get_with_hints(out_dim, "bias", init_bs)?;
    Ok(Linear::new(ws, Some(bs)))
}

pub fn linear_no_bias(in_dim: usize, out_dim: usize, vs: VarBuilder) -> Result<Linear> {
    let bound = 1.0 / (in_dim as f64).sqrt();
    let init_ws = Init::Uniform {
        lo: -bound,
        up: bound,
    };
    let ws = vs.get_with_hints((out_dim, in_dim), "weight", init_ws)?;
    Ok(Linear::new(ws, None))
}

/// Bias-free LeakyReLU stack ending in a plain linear layer, the score
/// network applied to stored edge weights.
pub struct WeightMlp {
    hidden: Vec<Linear>,
    out: Linear,
    activation: Activation,
}
impl WeightMlp {
    pub fn new(widths: &[usize], out_dim: usize, bias: bool, vs: VarBuilder) -> Result<Self> {
        let mut hidden = Vec::new();
        for i in 0..widths.len() - 1 {
            hidden.push(linear_no_bias(
                widths[i],
                widths[i + 1],
                vs.pp(format!("fc{}", i)),
            )?);
        }
        let last = *widths.last().unwrap();
        let out = if bias {
            linear(last, out_dim, vs.pp("out"))?
        } else {
            linear_no_bias(last, out_dim, vs.pp("out"))?
        };
        Ok(Self {
            hidden,
            out,
            activation: Activation::LeakyRelu(0.2),
        })
    }
}
impl Module for WeightMlp {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut h = xs.clone();
        for fc in &self.hidden {
            h = self.activation.forward(&fc.forward(&h)?)?;
        }
        self.out.forward(&h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn edge_index(pairs: &[(u32, u32)]) -> Tensor {
        let mut flat: Vec<u32> = pairs.iter().map(|&(u, _)| u).collect();
        flat.extend(pairs.iter().map(|&(_, v)| v));
        Tensor::from_vec(flat, (2, pairs.len()), &Device::Cpu).unwrap()
    }

    #[test]
    fn degrees_count_endpoints() {
        let ei = edge_index(&[(0, 1), (0, 2), (1, 2)]);
        assert_eq!(
            out_degree(&ei, 3).unwrap().to_vec1::<u32>().unwrap(),
            vec![2, 1, 0]
        );
        assert_eq!(
            in_degree(&ei, 3).unwrap().to_vec1::<u32>().unwrap(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn scatter_reducers_agree_on_single_incoming_edge() {
        let ei = edge_index(&[(0, 1)]);
        let messages = Tensor::from_vec(vec![3.0f32, -1.0], (1, 2), &Device::Cpu).unwrap();
        let aggs: [fn(&Tensor, &Tensor, usize) -> Result<Tensor>; 3] =
            [scatter_sum, scatter_mean, scatter_max];
        for agg in aggs {
            let out = agg(&messages, &ei, 2).unwrap().to_vec2::<f32>().unwrap();
            assert_eq!(out[0], vec![0.0, 0.0]);
            assert_eq!(out[1], vec![3.0, -1.0]);
        }
    }

    #[test]
    fn scatter_max_is_elementwise() {
        let ei = edge_index(&[(0, 2), (1, 2)]);
        let messages =
            Tensor::from_vec(vec![1.0f32, -2.0, 0.5, 4.0], (2, 2), &Device::Cpu).unwrap();
        let out = scatter_max(&messages, &ei, 3).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(out[2], vec![1.0, 4.0]);
    }
}
