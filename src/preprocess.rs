mod apsp;
pub use apsp::{ApspBackend, BfsApsp, DijkstraApsp};

mod structural;
pub use structural::{compute_structural_weights, structural_weights};

mod normalize;
pub use normalize::{normalize_weights, split_combined};
