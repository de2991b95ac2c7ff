pub mod datasets;
pub mod models;
pub mod nn;
pub mod preprocess;
pub mod train;
