use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use candle_core::{Device, Tensor};
use indicatif::ProgressBar;
use rayon::prelude::*;

use super::graph::Graph;
use super::traits::{DatasetStatistics, GraphDataset};
use super::utils::{download_and_extract, CompressionFormat};
use crate::preprocess::{normalize_weights, structural_weights};

/// Structural preprocessing mode. Unknown mode names are a configuration
/// error and fail fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprocess {
    ShortestPathGraph,
}

impl Preprocess {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "shortest_path_graph" => Ok(Self::ShortestPathGraph),
            _ => bail!("preprocess mode {} is not implemented", name),
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShortestPathGraph => "shortest_path_graph",
        }
    }
}

/// Graph classification/regression sets in the TU text format
/// (`<name>_A.txt`, `<name>_graph_indicator.txt`, `<name>_graph_labels.txt`
/// and optional node label/attribute files), downloaded from
/// graphlearning.io on first use.
///
/// With a preprocess mode set, per-edge structural weights are computed
/// through the shortest-path/SVD pass, cached to
/// `<name>_<mode>_new_adj.npz` under the dataset root, and attached to each
/// graph as a `(num_edges, 1)` weight tensor.
pub struct TuDataset {
    pub name: String,
    graphs: Vec<Graph>,
    labels: Vec<i64>,
    input_dim: usize,
    label_dim: usize,
    max_num_node: usize,
}

impl TuDataset {
    pub fn new<P: AsRef<Path>>(
        root: P,
        name: &str,
        preprocess: Option<Preprocess>,
    ) -> Result<Self> {
        let root = root.as_ref();
        let raw = root.join(name);
        if !raw.exists() {
            Self::download(root, name)?;
        }
        println!("[!] Dataset: {}", name);
        let mut dataset = Self::load(&raw, name)?;
        if let Some(mode) = preprocess {
            dataset.attach_structural_weights(root, mode)?;
        }
        Ok(dataset)
    }

    pub fn download<P: AsRef<Path>>(root: P, name: &str) -> Result<()> {
        let url = format!(
            "https://www.chrsmrrs.com/graphkerneldatasets/{}.zip",
            name
        );
        std::fs::create_dir_all(root.as_ref())?;
        download_and_extract(&url, root, CompressionFormat::Zip)
    }

    fn load(raw: &Path, name: &str) -> Result<Self> {
        let device = Device::Cpu;

        // one graph id (1-based) per node
        let indicator: Vec<usize> = read_lines(&raw.join(format!("{}_graph_indicator.txt", name)))?
            .iter()
            .map(|line| Ok(line.trim().parse::<usize>()? - 1))
            .collect::<Result<_>>()?;
        let num_graphs = indicator.iter().max().map_or(0, |&g| g + 1);

        // global node id (1-based) -> (graph, local index)
        let mut nodes_per_graph = vec![0usize; num_graphs];
        let mut local_index = Vec::with_capacity(indicator.len());
        for &g in &indicator {
            local_index.push(nodes_per_graph[g]);
            nodes_per_graph[g] += 1;
        }

        // edge lists; the TU format already stores both directions
        let mut edges = vec![Vec::new(); num_graphs];
        for line in read_lines(&raw.join(format!("{}_A.txt", name)))? {
            let (u, v) = line
                .split_once(',')
                .ok_or_else(|| anyhow!("malformed edge line: {}", line))?;
            let u: usize = u.trim().parse::<usize>()? - 1;
            let v: usize = v.trim().parse::<usize>()? - 1;
            let g = indicator[u];
            edges[g].push((local_index[u] as u32, local_index[v] as u32));
        }

        // labels remapped to 0..C-1 by sorted value
        let raw_labels: Vec<i64> = read_lines(&raw.join(format!("{}_graph_labels.txt", name)))?
            .iter()
            .map(|line| Ok(line.trim().parse::<i64>()?))
            .collect::<Result<_>>()?;
        let classes: Vec<i64> = raw_labels
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let labels: Vec<i64> = raw_labels
            .iter()
            .map(|label| classes.binary_search(label).unwrap() as i64)
            .collect();

        // node features: one-hot node labels, float attributes, or a
        // constant one-dim feature when the dataset ships neither
        let features = node_features(raw, name, &indicator)?;
        let input_dim = features[0].len();

        let mut graphs = Vec::with_capacity(num_graphs);
        let mut feature_rows = vec![Vec::new(); num_graphs];
        for (node, feats) in features.into_iter().enumerate() {
            feature_rows[indicator[node]].extend(feats);
        }
        let mut max_num_node = 0;
        for (g, rows) in feature_rows.into_iter().enumerate() {
            let num_nodes = nodes_per_graph[g];
            max_num_node = max_num_node.max(num_nodes);
            let node_feat = Tensor::from_vec(rows, (num_nodes, input_dim), &device)?;
            let num_edges = edges[g].len();
            let edge_feat = Tensor::ones((num_edges, 1), candle_core::DType::F32, &device)?;
            graphs.push(Graph {
                num_nodes,
                edges: std::mem::take(&mut edges[g]),
                node_feat,
                edge_feat,
                edge_weight: None,
            });
        }

        Ok(Self {
            name: name.to_owned(),
            graphs,
            label_dim: classes.len(),
            labels,
            input_dim,
            max_num_node,
        })
    }

    /// The expensive pass: per-graph structural weights, data-parallel
    /// across graphs, cached to disk after the first run.
    fn attach_structural_weights(&mut self, root: &Path, mode: Preprocess) -> Result<()> {
        let cache = self.adj_cache_path(root, mode);
        let combined: Vec<Tensor> = if cache.exists() {
            println!("Load adj from {:?}", cache);
            let mut tensors: Vec<(String, Tensor)> = Tensor::read_npz(&cache)?;
            tensors.sort_by_key(|(key, _)| {
                key.trim_start_matches("adj_").parse::<usize>().unwrap_or(0)
            });
            tensors.into_iter().map(|(_, tensor)| tensor).collect()
        } else {
            println!("Feature engineering...");
            let pbar = ProgressBar::new(self.graphs.len() as u64);
            let matrices: Vec<Vec<Vec<f64>>> = self
                .graphs
                .par_iter()
                .map(|graph| {
                    let adj = graph.adjacency();
                    let weight = match mode {
                        Preprocess::ShortestPathGraph => structural_weights(&adj)?,
                    };
                    pbar.inc(1);
                    Ok(normalize_weights(&weight, &adj))
                })
                .collect::<Result<_>>()?;
            pbar.finish_and_clear();

            let device = Device::Cpu;
            let tensors = matrices
                .into_iter()
                .map(|matrix| {
                    let n = matrix.len();
                    let flat: Vec<f32> = matrix.into_iter().flatten().map(|w| w as f32).collect();
                    Tensor::from_vec(flat, (n, n), &device)
                })
                .collect::<candle_core::Result<Vec<_>>>()?;
            let named: Vec<(String, &Tensor)> = tensors
                .iter()
                .enumerate()
                .map(|(i, tensor)| (format!("adj_{}", i), tensor))
                .collect();
            Tensor::write_npz(&named, &cache)?;
            tensors
        };

        let device = Device::Cpu;
        for (graph, matrix) in self.graphs.iter_mut().zip(combined.iter()) {
            let rows = matrix.to_vec2::<f32>()?;
            let weights: Vec<f32> = graph
                .edges
                .iter()
                .map(|&(u, v)| rows[u as usize][v as usize])
                .collect();
            graph.edge_weight = Some(Tensor::from_vec(
                weights,
                (graph.num_edges(), 1),
                &device,
            )?);
        }
        Ok(())
    }

    fn adj_cache_path(&self, root: &Path, mode: Preprocess) -> PathBuf {
        root.join(format!("{}_{}_new_adj.npz", self.name, mode.name()))
    }
}

impl GraphDataset for TuDataset {
    fn len(&self) -> usize {
        self.graphs.len()
    }
    fn graph(&self, index: usize) -> &Graph {
        &self.graphs[index]
    }
    fn labels(&self) -> &[i64] {
        &self.labels
    }
    fn statistics(&self) -> DatasetStatistics {
        DatasetStatistics {
            input_dim: self.input_dim,
            label_dim: self.label_dim,
            max_num_node: self.max_num_node,
        }
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let reader =
        BufReader::new(File::open(path).with_context(|| format!("missing TU file {:?}", path))?);
    let mut lines = Vec::new();
    for buf in reader.lines() {
        let line = buf?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn node_features(raw: &Path, name: &str, indicator: &[usize]) -> Result<Vec<Vec<f32>>> {
    let attributes = raw.join(format!("{}_node_attributes.txt", name));
    if attributes.exists() {
        return read_lines(&attributes)?
            .iter()
            .map(|line| {
                line.split(',')
                    .map(|tok| tok.trim().parse::<f32>().map_err(Into::into))
                    .collect()
            })
            .collect();
    }
    let node_labels = raw.join(format!("{}_node_labels.txt", name));
    if node_labels.exists() {
        let raw_labels: Vec<i64> = read_lines(&node_labels)?
            .iter()
            .map(|line| Ok(line.trim().parse::<i64>()?))
            .collect::<Result<_>>()?;
        let classes: Vec<i64> = raw_labels
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        return Ok(raw_labels
            .iter()
            .map(|label| {
                let mut one_hot = vec![0.0; classes.len()];
                one_hot[classes.binary_search(label).unwrap()] = 1.0;
                one_hot
            })
            .collect());
    }
    Ok(vec![vec![1.0]; indicator.len()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // two triangles with binary node labels
    fn write_toy_dataset(root: &Path) {
        let raw = root.join("TOY");
        std::fs::create_dir_all(&raw).unwrap();
        let write = |file: &str, content: &str| {
            let mut f = File::create(raw.join(format!("TOY_{}", file))).unwrap();
            f.write_all(content.as_bytes()).unwrap();
        };
        write(
            "A.txt",
            "1, 2\n2, 1\n2, 3\n3, 2\n1, 3\n3, 1\n4, 5\n5, 4\n5, 6\n6, 5\n4, 6\n6, 4\n",
        );
        write("graph_indicator.txt", "1\n1\n1\n2\n2\n2\n");
        write("graph_labels.txt", "2\n0\n");
        write("node_labels.txt", "0\n1\n0\n1\n1\n0\n");
    }

    #[test]
    fn parses_tu_format() {
        let dir = tempfile::tempdir().unwrap();
        write_toy_dataset(dir.path());
        let dataset = TuDataset::new(dir.path(), "TOY", None).unwrap();
        assert_eq!(dataset.len(), 2);
        let stats = dataset.statistics();
        assert_eq!(stats.input_dim, 2); // one-hot over two node label values
        assert_eq!(stats.label_dim, 2);
        assert_eq!(stats.max_num_node, 3);
        // raw labels {2, 0} remap to {1, 0}
        assert_eq!(dataset.labels(), &[1, 0]);
        assert_eq!(dataset.graph(0).num_edges(), 6);
        assert_eq!(dataset.graph(1).num_nodes, 3);
    }

    #[test]
    fn attaches_and_caches_structural_weights() {
        let dir = tempfile::tempdir().unwrap();
        write_toy_dataset(dir.path());
        let dataset =
            TuDataset::new(dir.path(), "TOY", Some(Preprocess::ShortestPathGraph)).unwrap();
        let cache = dir.path().join("TOY_shortest_path_graph_new_adj.npz");
        assert!(cache.exists());
        let weight = dataset.graph(0).edge_weight.as_ref().unwrap();
        assert_eq!(weight.dims(), &[6, 1]);
        // triangle rows normalize to 0.5 structural + 1 adjacency
        let values = weight.to_vec2::<f32>().unwrap();
        assert!(values.iter().all(|row| (row[0] - 1.5).abs() < 1e-6));

        // second load reads the cache and reproduces the same weights
        let reloaded =
            TuDataset::new(dir.path(), "TOY", Some(Preprocess::ShortestPathGraph)).unwrap();
        let again = reloaded.graph(0).edge_weight.as_ref().unwrap();
        assert_eq!(
            again.to_vec2::<f32>().unwrap(),
            weight.to_vec2::<f32>().unwrap()
        );
    }

    #[test]
    fn unknown_preprocess_mode_is_fatal() {
        assert!(Preprocess::from_name("bogus_mode").is_err());
        assert_eq!(
            Preprocess::from_name("shortest_path_graph").unwrap(),
            Preprocess::ShortestPathGraph
        );
    }
}
