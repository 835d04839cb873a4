//! Transfer functions for backpropagation nets and neighborhood functions for
//! self-organizing maps.
//!
//! Descriptors are immutable `'static` values; nets hold plain references to
//! them and look them up by name when restored from a snapshot.

use std::f32::consts::PI;
use std::fmt;

/// An activation function together with its derivative.
///
/// Both take the neuron's net input and a threshold `theta`.
pub struct TransferFunction {
    /// Symbolic name used for lookup.
    pub name: &'static str,
    /// f(x, theta).
    pub normal: fn(f32, f32) -> f32,
    /// f'(x, theta).
    pub derivative: fn(f32, f32) -> f32,
}

/// A SOM neighborhood function together with its radius decay.
pub struct DistanceFunction {
    /// Symbolic name used for lookup.
    pub name: &'static str,
    /// h(dist, sigma): influence of the BMU at lattice distance `dist`.
    pub distance: fn(f32, f32) -> f32,
    /// decay(start, t, lambda) = start * exp(-t / lambda).
    pub decay: fn(f32, f32, f32) -> f32,
}

impl fmt::Debug for TransferFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferFunction").field("name", &self.name).finish()
    }
}

impl fmt::Debug for DistanceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistanceFunction").field("name", &self.name).finish()
    }
}

fn tanh_normal(x: f32, theta: f32) -> f32 {
    (x - theta).tanh()
}

fn tanh_derivative(x: f32, theta: f32) -> f32 {
    1.0 - (x - theta).tanh().powi(2)
}

fn log_normal(x: f32, theta: f32) -> f32 {
    1.0 / (1.0 + (theta - x).exp())
}

fn log_derivative(x: f32, theta: f32) -> f32 {
    let e = (theta - x).exp();
    e / (e + 1.0).powi(2)
}

fn linear_normal(x: f32, theta: f32) -> f32 {
    x - theta
}

fn binary_normal(x: f32, theta: f32) -> f32 {
    if x >= theta {
        1.0
    } else {
        -1.0
    }
}

fn unit_derivative(_x: f32, _theta: f32) -> f32 {
    1.0
}

/// Gaussian bell: `exp(-dist^2 / (2 sigma^2))`.
pub fn gaussian_bell(dist: f32, sigma: f32) -> f32 {
    (-dist.powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Mexican hat (Ricker wavelet) scaled by the Gaussian bell.
pub fn mexican_hat(dist: f32, sigma: f32) -> f32 {
    (2.0 / 3f32.sqrt() * PI.powf(-0.25)) * (1.0 - dist.powi(2)) * gaussian_bell(dist, sigma)
}

/// Exponential decay `start * exp(-t / lambda)`.
pub fn exponential_decay(start: f32, t: f32, lambda: f32) -> f32 {
    start * (-t / lambda).exp()
}

/// tanh(x - theta).
pub static TANH: TransferFunction = TransferFunction {
    name: "tanh",
    normal: tanh_normal,
    derivative: tanh_derivative,
};

/// Logistic sigmoid 1 / (1 + e^(theta - x)).
pub static LOGISTIC: TransferFunction = TransferFunction {
    name: "log",
    normal: log_normal,
    derivative: log_derivative,
};

/// x - theta.
pub static LINEAR: TransferFunction = TransferFunction {
    name: "linear",
    normal: linear_normal,
    derivative: unit_derivative,
};

/// 1 if x >= theta, else -1.
pub static BINARY: TransferFunction = TransferFunction {
    name: "binary",
    normal: binary_normal,
    derivative: unit_derivative,
};

/// Gaussian neighborhood.
pub static GAUSSIAN: DistanceFunction = DistanceFunction {
    name: "gaussian",
    distance: gaussian_bell,
    decay: exponential_decay,
};

/// Mexican-hat neighborhood.
pub static MEXICAN_HAT: DistanceFunction = DistanceFunction {
    name: "mexican",
    distance: mexican_hat,
    decay: exponential_decay,
};

/// Resolves a transfer function by name.
pub fn resolve_transfer(name: &str) -> Option<&'static TransferFunction> {
    match name {
        "tanh" => Some(&TANH),
        "log" => Some(&LOGISTIC),
        "linear" => Some(&LINEAR),
        "binary" => Some(&BINARY),
        _ => None,
    }
}

/// Resolves a neighborhood function by name.
pub fn resolve_distance(name: &str) -> Option<&'static DistanceFunction> {
    match name {
        "gaussian" => Some(&GAUSSIAN),
        "mexican" => Some(&MEXICAN_HAT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_name() {
        assert_eq!(resolve_transfer("tanh").map(|f| f.name), Some("tanh"));
        assert_eq!(resolve_transfer("log").map(|f| f.name), Some("log"));
        assert_eq!(resolve_distance("mexican").map(|f| f.name), Some("mexican"));
        assert!(resolve_transfer("relu").is_none());
        assert!(resolve_distance("cosine").is_none());
    }

    #[test]
    fn test_transfer_values() {
        assert!(((LINEAR.normal)(2.0, 0.5) - 1.5).abs() < 1e-6);
        assert_eq!((BINARY.normal)(0.2, 0.2), 1.0);
        assert_eq!((BINARY.normal)(0.1, 0.2), -1.0);
        assert!(((LOGISTIC.normal)(0.0, 0.0) - 0.5).abs() < 1e-6);
        assert!(((LOGISTIC.derivative)(0.0, 0.0) - 0.25).abs() < 1e-6);
        assert!(((TANH.derivative)(0.0, 0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_gaussian_peak_and_monotonic() {
        let sigma = 1.5;
        assert!(((GAUSSIAN.distance)(0.0, sigma) - 1.0).abs() < 1e-6);

        let mut previous = (GAUSSIAN.distance)(0.0, sigma);
        for step in 1..20 {
            let d = step as f32 * 0.25;
            let h = (GAUSSIAN.distance)(d, sigma);
            assert!(h < previous);
            assert!(((GAUSSIAN.distance)(-d, sigma) - h).abs() < 1e-6);
            previous = h;
        }
    }

    #[test]
    fn test_mexican_hat_changes_sign() {
        assert!(mexican_hat(0.0, 2.0) > 0.0);
        assert!(mexican_hat(1.5, 2.0) < 0.0);
    }

    #[test]
    fn test_decay() {
        assert!((exponential_decay(2.0, 0.0, 10.0) - 2.0).abs() < 1e-6);
        assert!((exponential_decay(2.0, 10.0, 10.0) - 2.0 / std::f32::consts::E).abs() < 1e-5);
    }
}
