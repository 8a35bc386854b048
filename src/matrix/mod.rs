pub mod csr;
pub mod dist;
pub mod hierarchy;
pub mod lowrank;

pub use csr::Csr;
pub use dist::{DistCsr, GhostScatter, RowPartition};
pub use hierarchy::{AggregationParams, GridHierarchy, Level};
pub use lowrank::{LowRankUpdate, Operator};
