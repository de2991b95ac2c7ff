use super::graph::Graph;

#[derive(Debug, Clone, Copy)]
pub struct DatasetStatistics {
    pub input_dim: usize,
    pub label_dim: usize,
    pub max_num_node: usize,
}

/// A collection of labeled graphs with dataset-level statistics. The
/// split cache and the batch loader only see this surface.
pub trait GraphDataset {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn graph(&self, index: usize) -> &Graph;
    fn labels(&self) -> &[i64];
    fn statistics(&self) -> DatasetStatistics;
}
