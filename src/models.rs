mod traits;
pub use traits::GraphRegressor;
mod readout;
pub use readout::{mean_nodes, MlpReadout};

mod gcn;
pub use gcn::GcnNet;
mod gin;
pub use gin::GinNet;
mod unionsnn;
pub use unionsnn::{NetParams, UnionSnnNet};

use candle_core::{bail, Result};
use candle_nn::VarBuilder;

/// Model selector keyed by user-facing name. Unknown names are a
/// configuration error.
pub fn gnn_model(
    name: &str,
    params: NetParams,
    vs: VarBuilder,
) -> Result<Box<dyn GraphRegressor>> {
    match name {
        "UnionSNN" => Ok(Box::new(UnionSnnNet::new(params, vs)?)),
        "GCN" => Ok(Box::new(GcnNet::new(params, vs)?)),
        "GIN" => Ok(Box::new(GinNet::new(params, vs)?)),
        _ => bail!("model {} is not implemented", name),
    }
}
