//! Self-organizing maps.
//!
//! - **Single unit**: sequential BMU search and adaptation over the graph (kohonen.rs)
//! - **Partitioned**: output layer split over execution units, trained with rayon (parallel.rs)
//! - **Kernels**: distance, conscience and update formulas both paths share (kernels.rs)

pub mod kernels;
mod kohonen;
pub mod parallel;

pub use kohonen::{Kohonen, SomNet, TrainingMetrics};
pub use parallel::{
    plan_partitions, train_partitions, CpuUnits, DeviceEnumerator, ExecutionUnit, PartitionExport,
    WorkPartition,
};
