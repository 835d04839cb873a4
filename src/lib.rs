//! # neuronet - Neural Network Engine
//!
//! neuronet trains two kinds of nets over one neuron/edge/layer graph:
//! supervised backpropagation nets and unsupervised self-organizing maps
//! (SOMs), with an optional partitioned path that spreads SOM training over
//! several execution units.
//!
//! ## Key Features
//!
//! - **Backpropagation** with momentum and weight decay
//! - **Self-Organizing Maps** with BMU search, neighborhood decay and a conscience bias
//! - **Partitioned SOM training** on the rayon pool, merged back by neuron range
//! - **Dense 2D/3D arrays** for moving weight and position matrices around
//! - **Binary snapshots** for persistence
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use neuronet::{BpConfig, BpNet, TrainingSet};
//! use std::sync::Arc;
//!
//! let mut net = BpNet::new(&BpConfig::default())?;
//! net.create_net(&[2, 3, 1], true)?;
//!
//! let mut set = TrainingSet::new();
//! set.add_sample(vec![0.0, 1.0], vec![1.0]);
//! net.set_training_set(Arc::new(set));
//!
//! let errors = net.train_from_data(500, 0.001)?;
//! let output = net.run(&[0.0, 1.0])?;
//! ```
//!
//! ## Training a Map
//!
//! ```rust,ignore
//! use neuronet::{CpuUnits, SomConfig, SomNet, TrainingSet};
//! use std::sync::Arc;
//!
//! let mut som = SomNet::new(&SomConfig::default())?;
//! som.create_som(&[3], &[16, 16])?;
//! som.set_training_set(Arc::new(colors));
//!
//! // Single unit
//! let metrics = som.training(100)?;
//!
//! // Partitioned over every rayon worker
//! let metrics = som.training_parallel(100, &CpuUnits::default())?;
//! som.save("colors.som")?;
//! ```
//!
//! ## Architecture
//!
//! - [`containers`] - Dense arrays and training sets
//! - [`math`] - Transfer and neighborhood functions
//! - [`graph`] - Neurons, edges, layers and snapshots
//! - [`net`] - The net and its algorithm strategy
//! - [`bp`] - Backpropagation
//! - [`som`] - Self-organizing maps and partitioned training
//! - [`storage`] - Binary format and persistence

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bp;
pub mod config;
pub mod containers;
pub mod error;
pub mod graph;
pub mod math;
pub mod net;
pub mod som;
pub mod storage;

// Re-export commonly used types
pub use bp::{Backprop, BpNet};
pub use config::{BpConfig, Config, ParallelConfig, SomConfig};
pub use containers::{Array2DView, Array2DViewMut, F2DArray, F3DArray, TrainingData, TrainingSet};
pub use error::{NetError, Result};
pub use graph::{Edge, EdgeId, Graph, Layer, LayerFlags, Neuron, NeuronKind, NeuronRef};
pub use math::{resolve_distance, resolve_transfer, DistanceFunction, TransferFunction};
pub use net::{Algorithm, Net, NetKind};
pub use som::{
    CpuUnits, DeviceEnumerator, ExecutionUnit, Kohonen, PartitionExport, SomNet, TrainingMetrics,
    WorkPartition,
};
pub use storage::{NetFormat, NetHeader};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
