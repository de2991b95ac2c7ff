mod traits;
pub use traits::*;
pub mod utils;

mod gcn;
pub use gcn::GcnConv;
mod gin;
pub use gin::{GinConv, Mlp};
mod unionsnn;
pub use unionsnn::{Aggregator, UnionSnnConv, UnionSnnConvConfig};
