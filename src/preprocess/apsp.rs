use std::cmp::Ordering;
use std::collections::BinaryHeap;

use anyhow::{bail, Result};

/// All-pairs shortest paths over a small subgraph given as an adjacency list.
///
/// Backends are swappable because the APSP pass sits inside the per-edge
/// structural-weight loop and dominates preprocessing time. `dists[i][j]` is
/// the hop distance from node `i` to node `j`; a missing pair is reported as
/// an error, never as a silent zero.
pub trait ApspBackend: Sync {
    fn all_pairs(&self, adj: &[Vec<usize>]) -> Result<Vec<Vec<f64>>>;
}

const UNREACHED: f64 = f64::INFINITY;

fn check_reachable(dists: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>> {
    for (i, row) in dists.iter().enumerate() {
        for (j, &d) in row.iter().enumerate() {
            if d == UNREACHED {
                bail!(
                    "target node not reachable in union subgraph, pair ({}, {})",
                    i,
                    j
                );
            }
        }
    }
    Ok(dists)
}

/// Breadth-first APSP. Exact for the unit edge weights of a binary
/// adjacency, and the fast default.
#[derive(Debug, Default, Clone, Copy)]
pub struct BfsApsp;

impl ApspBackend for BfsApsp {
    fn all_pairs(&self, adj: &[Vec<usize>]) -> Result<Vec<Vec<f64>>> {
        let n = adj.len();
        let mut dists = vec![vec![UNREACHED; n]; n];
        let mut queue = std::collections::VecDeque::new();
        for s in 0..n {
            dists[s][s] = 0.0;
            queue.clear();
            queue.push_back(s);
            while let Some(u) = queue.pop_front() {
                for &v in &adj[u] {
                    if dists[s][v] == UNREACHED {
                        dists[s][v] = dists[s][u] + 1.0;
                        queue.push_back(v);
                    }
                }
            }
        }
        check_reachable(dists)
    }
}

/// Dijkstra-based APSP, the general fallback for weighted subgraphs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DijkstraApsp;

#[derive(Clone, Copy, PartialEq)]
struct State {
    cost: f64,
    node: usize,
}
impl Eq for State {}
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed for a min-heap
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl ApspBackend for DijkstraApsp {
    fn all_pairs(&self, adj: &[Vec<usize>]) -> Result<Vec<Vec<f64>>> {
        let n = adj.len();
        let mut dists = vec![vec![UNREACHED; n]; n];
        let mut heap = BinaryHeap::new();
        for s in 0..n {
            dists[s][s] = 0.0;
            heap.clear();
            heap.push(State { cost: 0.0, node: s });
            while let Some(State { cost, node }) = heap.pop() {
                if cost > dists[s][node] {
                    continue;
                }
                for &v in &adj[node] {
                    let next = cost + 1.0;
                    if next < dists[s][v] {
                        dists[s][v] = next;
                        heap.push(State { cost: next, node: v });
                    }
                }
            }
        }
        check_reachable(dists)
    }
}
