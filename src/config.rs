//! Configuration for backpropagation nets, self-organizing maps and the
//! parallel SOM path.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Main configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backpropagation net configuration.
    pub bp: BpConfig,

    /// Self-organizing map configuration.
    pub som: SomConfig,

    /// Parallel SOM execution configuration.
    pub parallel: ParallelConfig,
}

/// Backpropagation net configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BpConfig {
    /// Name of the transfer function ("tanh", "log", "linear", "binary").
    /// Default: "tanh".
    pub transfer: String,

    /// Learning rate scalar.
    /// Default: 0.01.
    pub learning_rate: f32,

    /// Fraction of the previous update carried into the current one.
    /// Default: 0.0.
    pub momentum: f32,

    /// Regularization term subtracted proportionally to the current weight.
    /// Default: 0.0.
    pub weight_decay: f32,

    /// Threshold passed to the transfer function.
    /// Default: 0.0.
    pub theta: f32,

    /// Random seed for weight initialization.
    /// Default: None (random).
    pub seed: Option<u64>,
}

impl Default for BpConfig {
    fn default() -> Self {
        Self {
            transfer: "tanh".to_string(),
            learning_rate: 0.01,
            momentum: 0.0,
            weight_decay: 0.0,
            theta: 0.0,
            seed: None,
        }
    }
}

/// Self-organizing map configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SomConfig {
    /// Name of the neighborhood function ("gaussian", "mexican").
    /// Default: "gaussian".
    pub distance: String,

    /// Initial learning rate.
    /// Default: 0.5.
    pub learning_rate: f32,

    /// Conscience rate in [0, 1). Zero gives the classical Kohonen rule.
    /// Default: 0.0.
    pub conscience_rate: f32,

    /// Initial neighborhood radius.
    /// Default: None (half the largest extent of the output lattice).
    pub sigma0: Option<f32>,

    /// Time constant of the radius decay.
    /// Default: None (cycles / ln(sigma0), fixed when training starts).
    pub lambda: Option<f32>,

    /// Random seed for weight initialization.
    /// Default: None (random).
    pub seed: Option<u64>,
}

impl Default for SomConfig {
    fn default() -> Self {
        Self {
            distance: "gaussian".to_string(),
            learning_rate: 0.5,
            conscience_rate: 0.0,
            sigma0: None,
            lambda: None,
            seed: None,
        }
    }
}

/// Parallel SOM execution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of execution units to partition the output layer over.
    /// Default: 0 (one per rayon worker thread).
    pub num_units: usize,
}

/// Builds the generator used for construction-time randomness.
pub fn rng_from_seed(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}
