use candle_core::{Result, Tensor};

pub trait GnnModule {
    fn forward_t(&self, xs: &Tensor, edge_index: &Tensor, train: bool) -> Result<Tensor>;
    fn forward(&self, xs: &Tensor, edge_index: &Tensor) -> Result<Tensor> {
        self.forward_t(xs, edge_index, false)
    }
}
