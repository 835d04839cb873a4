//! Numeric building blocks shared by both net kinds.

pub mod functions;

pub use functions::{
    resolve_distance, resolve_transfer, DistanceFunction, TransferFunction, BINARY, GAUSSIAN,
    LINEAR, LOGISTIC, MEXICAN_HAT, TANH,
};
