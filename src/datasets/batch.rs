use anyhow::Result;
use candle_core::{Device, Tensor};
use itertools::Itertools;

use super::graph::Graph;
use super::traits::GraphDataset;

/// Disjoint union of a list of graphs plus a stacked label tensor: node
/// indices are offset per graph, edge lists and features concatenated, and
/// every node carries the id of the graph it came from so graph-level
/// readouts can pool per graph.
#[derive(Debug, Clone)]
pub struct GraphBatch {
    /// (total_nodes, input_dim)
    pub xs: Tensor,
    /// (2, total_edges) u32
    pub edge_index: Tensor,
    /// (total_edges, edge_dim)
    pub edge_feat: Tensor,
    /// (total_edges, 1), present when all member graphs carry weights
    pub edge_weight: Option<Tensor>,
    /// (total_nodes,) u32
    pub graph_ids: Tensor,
    pub num_graphs: usize,
    pub num_nodes: usize,
    /// (num_graphs,) f32 regression targets
    pub ys: Tensor,
    /// optional positional encodings, checked explicitly by the training
    /// loop (never discovered by a failing call)
    pub pos_enc: Option<Tensor>,
}

pub fn collate(samples: &[(&Graph, f32)], device: &Device) -> Result<GraphBatch> {
    let all_weighted = samples.iter().all(|(graph, _)| graph.edge_weight.is_some());

    let mut xs = Vec::with_capacity(samples.len());
    let mut edge_feats = Vec::with_capacity(samples.len());
    let mut edge_weights = Vec::with_capacity(samples.len());
    let mut sources = Vec::new();
    let mut targets = Vec::new();
    let mut graph_ids = Vec::new();
    let mut ys = Vec::with_capacity(samples.len());

    let mut offset = 0u32;
    for (graph_id, (graph, label)) in samples.iter().enumerate() {
        xs.push(graph.node_feat.clone());
        edge_feats.push(graph.edge_feat.clone());
        if all_weighted {
            edge_weights.push(graph.edge_weight.clone().unwrap());
        }
        sources.extend(graph.edges.iter().map(|&(u, _)| u + offset));
        targets.extend(graph.edges.iter().map(|&(_, v)| v + offset));
        graph_ids.extend(std::iter::repeat(graph_id as u32).take(graph.num_nodes));
        ys.push(*label);
        offset += graph.num_nodes as u32;
    }

    let num_nodes = offset as usize;
    let num_edges = sources.len();
    let mut flat = sources;
    flat.extend(targets);
    Ok(GraphBatch {
        xs: Tensor::cat(&xs, 0)?,
        edge_index: Tensor::from_vec(flat, (2, num_edges), device)?,
        edge_feat: Tensor::cat(&edge_feats, 0)?,
        edge_weight: if all_weighted {
            Some(Tensor::cat(&edge_weights, 0)?)
        } else {
            None
        },
        graph_ids: Tensor::from_vec(graph_ids, num_nodes, device)?,
        num_graphs: samples.len(),
        num_nodes,
        ys: Tensor::from_vec(ys, samples.len(), device)?,
        pos_enc: None,
    })
}

/// Fixed-size mini-batches over the given dataset indices, in order.
/// Shuffling is the caller's concern (the training loop reshuffles the
/// index list each epoch).
pub fn make_loader<D: GraphDataset>(
    dataset: &D,
    indices: &[usize],
    batch_size: usize,
    device: &Device,
) -> Result<Vec<GraphBatch>> {
    let labels = dataset.labels();
    let mut batches = Vec::new();
    for chunk in &indices.iter().chunks(batch_size) {
        let samples: Vec<(&Graph, f32)> = chunk
            .map(|&idx| (dataset.graph(idx), labels[idx] as f32))
            .collect();
        batches.push(collate(&samples, device)?);
    }
    Ok(batches)
}
