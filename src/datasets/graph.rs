use candle_core::{Device, Result, Tensor};

/// A single graph: node features, a directed edge list (undirected graphs
/// carry both directions), optional per-edge structural weights.
#[derive(Debug, Clone)]
pub struct Graph {
    pub num_nodes: usize,
    /// (source, target) pairs
    pub edges: Vec<(u32, u32)>,
    /// (num_nodes, input_dim) f32
    pub node_feat: Tensor,
    /// (num_edges, edge_dim) f32
    pub edge_feat: Tensor,
    /// (num_edges, 1) f32, attached by the structural preprocessing pass
    pub edge_weight: Option<Tensor>,
}

impl Graph {
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Dense binary adjacency, input to the structural-weight computation.
    pub fn adjacency(&self) -> Vec<Vec<u8>> {
        let mut adj = vec![vec![0u8; self.num_nodes]; self.num_nodes];
        for &(u, v) in &self.edges {
            adj[u as usize][v as usize] = 1;
        }
        adj
    }

    /// (2, num_edges) u32 tensor of sources then targets.
    pub fn edge_index(&self, device: &Device) -> Result<Tensor> {
        let mut flat = Vec::with_capacity(2 * self.edges.len());
        flat.extend(self.edges.iter().map(|&(u, _)| u));
        flat.extend(self.edges.iter().map(|&(_, v)| v));
        Tensor::from_vec(flat, (2, self.edges.len()), device)
    }
}
