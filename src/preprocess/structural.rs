use std::collections::BTreeSet;

use anyhow::Result;
use nalgebra::DMatrix;

use super::apsp::{ApspBackend, BfsApsp};

/// Structural edge weights for a graph given as a dense binary adjacency.
///
/// For every edge (u, v) the induced subgraph over
/// `neighbors(u) ∪ {u} ∪ neighbors(v) ∪ {v}` is built, its all-pairs
/// shortest-path matrix computed, and the sum of that matrix's singular
/// values assigned symmetrically to `weight[u][v]` and `weight[v][u]`.
/// Non-edges stay zero. The SVD per edge makes this
/// O(E * |union|^3), which is why the APSP backend is pluggable and the
/// caller parallelizes across graphs.
pub fn compute_structural_weights(
    adjacency: &[Vec<u8>],
    backend: &dyn ApspBackend,
) -> Result<Vec<Vec<f64>>> {
    let n = adjacency.len();
    let mut weight = vec![vec![0.0; n]; n];

    for u in 0..n {
        for v in 0..n {
            // undirected structure: each unordered edge is computed once
            if u > v && adjacency[v][u] != 0 {
                continue;
            }
            if adjacency[u][v] == 0 && adjacency[v][u] == 0 {
                continue;
            }
            if adjacency[u][v] == 0 && u < v {
                // reverse-only direction handled from (v, u)
                continue;
            }
            let sum_w = union_subgraph_weight(adjacency, u, v, backend)?;
            weight[u][v] = sum_w;
            weight[v][u] = sum_w;
        }
    }
    Ok(weight)
}

/// Convenience wrapper using the BFS backend.
pub fn structural_weights(adjacency: &[Vec<u8>]) -> Result<Vec<Vec<f64>>> {
    compute_structural_weights(adjacency, &BfsApsp)
}

fn union_subgraph_weight(
    adjacency: &[Vec<u8>],
    u: usize,
    v: usize,
    backend: &dyn ApspBackend,
) -> Result<f64> {
    let n = adjacency.len();

    // union of both endpoints' closed neighborhoods
    let mut nodes = BTreeSet::new();
    nodes.insert(u);
    nodes.insert(v);
    for j in 0..n {
        if adjacency[u][j] != 0 {
            nodes.insert(j);
        }
        if adjacency[v][j] != 0 {
            nodes.insert(j);
        }
    }
    let nodes: Vec<usize> = nodes.into_iter().collect();
    let mut local = vec![usize::MAX; n];
    for (i, &g) in nodes.iter().enumerate() {
        local[g] = i;
    }

    // induced adjacency, undirected
    let m = nodes.len();
    let mut adj = vec![Vec::new(); m];
    for (i, &a) in nodes.iter().enumerate() {
        for &b in &nodes {
            if a != b && (adjacency[a][b] != 0 || adjacency[b][a] != 0) {
                adj[i].push(local[b]);
            }
        }
    }

    let dists = backend.all_pairs(&adj)?;
    let flat: Vec<f64> = dists.into_iter().flatten().collect();
    let d = DMatrix::from_row_slice(m, m, &flat);
    Ok(d.singular_values().iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adj_from_edges(n: usize, edges: &[(usize, usize)]) -> Vec<Vec<u8>> {
        let mut adj = vec![vec![0u8; n]; n];
        for &(u, v) in edges {
            adj[u][v] = 1;
            adj[v][u] = 1;
        }
        adj
    }

    #[test]
    fn no_edges_gives_zero_matrix() {
        let adj = adj_from_edges(3, &[]);
        let w = structural_weights(&adj).unwrap();
        assert_eq!(w, vec![vec![0.0; 3]; 3]);
    }

    #[test]
    fn output_is_symmetric() {
        let adj = adj_from_edges(5, &[(0, 1), (1, 2), (2, 3), (3, 0), (1, 4)]);
        let w = structural_weights(&adj).unwrap();
        for i in 0..5 {
            for j in 0..5 {
                assert_eq!(w[i][j], w[j][i], "asymmetry at ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn single_edge_weight_is_two() {
        // union subgraph of the only edge is the 2-node path; its APSP
        // matrix [[0, 1], [1, 0]] has singular values {1, 1}
        let adj = adj_from_edges(2, &[(0, 1)]);
        let w = structural_weights(&adj).unwrap();
        assert!((w[0][1] - 2.0).abs() < 1e-9);
        assert!((w[1][0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn four_ring_has_equal_edge_weights_and_zero_nonedges() {
        let adj = adj_from_edges(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]);
        let w = structural_weights(&adj).unwrap();
        // every edge sees the whole ring as its union subgraph; the APSP
        // matrix is the circulant of (0, 1, 2, 1) whose singular values
        // are {4, 2, 2, 0}
        for &(u, v) in &[(0, 1), (1, 2), (2, 3), (3, 0)] {
            assert!((w[u][v] - 8.0).abs() < 1e-6, "edge ({}, {}): {}", u, v, w[u][v]);
            assert!((w[v][u] - 8.0).abs() < 1e-6);
        }
        assert_eq!(w[0][2], 0.0);
        assert_eq!(w[1][3], 0.0);
    }

    #[test]
    fn directed_input_is_treated_as_undirected() {
        let mut adj = vec![vec![0u8; 2]; 2];
        adj[0][1] = 1; // one direction only
        let w = structural_weights(&adj).unwrap();
        assert!((w[0][1] - 2.0).abs() < 1e-9);
        assert_eq!(w[0][1], w[1][0]);
    }
}
