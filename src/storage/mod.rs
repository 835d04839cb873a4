//! Persistence of trained nets.
//!
//! A net is stored as its hyperparameters, the name of its function
//! descriptor and the exported graph. Descriptors are resolved by name on
//! load, so a snapshot naming an unknown function is rejected.

mod format;

pub use format::{NetFormat, NetHeader, HEADER_SIZE};

use crate::bp::{Backprop, BpNet};
use crate::config::rng_from_seed;
use crate::error::{NetError, Result};
use crate::graph::snapshot::GraphRecord;
use crate::graph::Graph;
use crate::math::{resolve_distance, resolve_transfer};
use crate::net::{Net, NetKind};
use crate::som::{Kohonen, SomNet};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize)]
struct BpSnapshot {
    transfer: String,
    learning_rate: f32,
    momentum: f32,
    weight_decay: f32,
    theta: f32,
    graph: GraphRecord,
}

#[derive(Serialize, Deserialize)]
struct SomSnapshot {
    distance: String,
    learning_rate: f32,
    conscience_rate: f32,
    sigma0: f32,
    configured_sigma0: Option<f32>,
    lambda: Option<f32>,
    graph: GraphRecord,
}

impl BpNet {
    fn snapshot(&self) -> BpSnapshot {
        let a = &self.algorithm;
        BpSnapshot {
            transfer: a.transfer.name.to_string(),
            learning_rate: a.learning_rate,
            momentum: a.momentum,
            weight_decay: a.weight_decay,
            theta: a.theta,
            graph: self.graph.export(),
        }
    }

    fn from_snapshot(snapshot: BpSnapshot) -> Result<Self> {
        let transfer = resolve_transfer(&snapshot.transfer)
            .ok_or_else(|| NetError::UnknownFunction(snapshot.transfer.clone()))?;
        let algorithm = Backprop {
            transfer,
            learning_rate: snapshot.learning_rate,
            momentum: snapshot.momentum,
            weight_decay: snapshot.weight_decay,
            theta: snapshot.theta,
        };

        let mut net = Net::with_algorithm(algorithm, rng_from_seed(None));
        net.graph = Graph::from_records(&snapshot.graph)?;
        Ok(net)
    }

    /// Serializes the net into a snapshot buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        NetFormat::encode(NetKind::Backprop, &self.snapshot())
    }

    /// Restores a net from a snapshot buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_snapshot(NetFormat::decode(bytes, NetKind::Backprop)?)
    }

    /// Saves the net to a snapshot file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        NetFormat::write(path.as_ref(), NetKind::Backprop, &self.snapshot())?;
        info!("Saved BP net to {}", path.as_ref().display());
        Ok(())
    }

    /// Loads a net from a snapshot file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let net = Self::from_snapshot(NetFormat::read(path.as_ref(), NetKind::Backprop)?)?;
        info!("Loaded BP net from {}", path.as_ref().display());
        Ok(net)
    }
}

impl SomNet {
    fn snapshot(&self) -> SomSnapshot {
        let a = &self.algorithm;
        SomSnapshot {
            distance: a.distance.name.to_string(),
            learning_rate: a.learning_rate,
            conscience_rate: a.conscience_rate,
            sigma0: a.sigma0,
            configured_sigma0: a.configured_sigma0,
            lambda: a.lambda,
            graph: self.graph.export(),
        }
    }

    fn from_snapshot(snapshot: SomSnapshot) -> Result<Self> {
        let distance = resolve_distance(&snapshot.distance)
            .ok_or_else(|| NetError::UnknownFunction(snapshot.distance.clone()))?;
        let algorithm = Kohonen {
            distance,
            learning_rate: snapshot.learning_rate,
            conscience_rate: snapshot.conscience_rate,
            sigma0: snapshot.sigma0,
            configured_sigma0: snapshot.configured_sigma0,
            lambda: snapshot.lambda,
        };
        algorithm.validate().map_err(|e| NetError::InvalidFormat(e.to_string()))?;

        let mut net = Net::with_algorithm(algorithm, rng_from_seed(None));
        net.graph = Graph::from_records(&snapshot.graph)?;
        Ok(net)
    }

    /// Serializes the map into a snapshot buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        NetFormat::encode(NetKind::Som, &self.snapshot())
    }

    /// Restores a map from a snapshot buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_snapshot(NetFormat::decode(bytes, NetKind::Som)?)
    }

    /// Saves the map to a snapshot file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        NetFormat::write(path.as_ref(), NetKind::Som, &self.snapshot())?;
        info!("Saved SOM to {}", path.as_ref().display());
        Ok(())
    }

    /// Loads a map from a snapshot file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let net = Self::from_snapshot(NetFormat::read(path.as_ref(), NetKind::Som)?)?;
        info!("Loaded SOM from {}", path.as_ref().display());
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BpConfig, SomConfig};
    use tempfile::TempDir;

    #[test]
    fn test_bp_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("net.bin");

        let config = BpConfig { transfer: "log".to_string(), momentum: 0.3, seed: Some(5), ..Default::default() };
        let mut net = BpNet::new(&config).unwrap();
        net.create_net(&[3, 4, 2], true).unwrap();
        let expected = net.run(&[0.1, 0.5, 0.9]).unwrap();
        net.save(&path).unwrap();

        let mut loaded = BpNet::load(&path).unwrap();
        assert_eq!(loaded.algorithm().transfer().name, "log");
        assert_eq!(loaded.algorithm().momentum(), 0.3);
        assert_eq!(loaded.run(&[0.1, 0.5, 0.9]).unwrap(), expected);
    }

    #[test]
    fn test_som_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("map.bin");

        let config = SomConfig { distance: "mexican".to_string(), conscience_rate: 0.1, seed: Some(8), ..Default::default() };
        let mut net = SomNet::new(&config).unwrap();
        net.create_som(&[2], &[4, 4]).unwrap();
        let bmu = net.find_bmu(&[0.3, 0.6]).unwrap();
        net.save(&path).unwrap();
        assert_eq!(NetFormat::read_header(&path).unwrap().kind, NetKind::Som);

        let mut loaded = SomNet::load(&path).unwrap();
        assert_eq!(loaded.sigma0(), net.sigma0());
        assert_eq!(loaded.conscience_rate(), 0.1);
        assert_eq!(loaded.algorithm().distance_function().name, "mexican");
        assert_eq!(loaded.find_bmu(&[0.3, 0.6]).unwrap(), bmu);
        assert_eq!(loaded.graph().export_positions(1, 0..16), net.graph().export_positions(1, 0..16));
    }

    #[test]
    fn test_kind_mismatch() {
        let mut net = SomNet::new(&SomConfig { seed: Some(1), ..Default::default() }).unwrap();
        net.create_som(&[2], &[3]).unwrap();
        let bytes = net.to_bytes().unwrap();
        assert!(matches!(BpNet::from_bytes(&bytes), Err(NetError::InvalidFormat(_))));
    }

    #[test]
    fn test_unknown_function_name() {
        let mut net = BpNet::new(&BpConfig { seed: Some(1), ..Default::default() }).unwrap();
        net.create_net(&[2, 1], false).unwrap();
        let mut snapshot: BpSnapshot = NetFormat::decode(&net.to_bytes().unwrap(), NetKind::Backprop).unwrap();
        snapshot.transfer = "softplus".to_string();
        let bytes = NetFormat::encode(NetKind::Backprop, &snapshot).unwrap();
        assert!(matches!(BpNet::from_bytes(&bytes), Err(NetError::UnknownFunction(_))));
    }

    #[test]
    fn test_invalid_som_hyperparameters_rejected() {
        let mut net = SomNet::new(&SomConfig { seed: Some(2), ..Default::default() }).unwrap();
        net.create_som(&[2], &[4]).unwrap();
        let bytes = net.to_bytes().unwrap();

        let mut snapshot: SomSnapshot = NetFormat::decode(&bytes, NetKind::Som).unwrap();
        snapshot.lambda = Some(0.0);
        let bytes_zero_lambda = NetFormat::encode(NetKind::Som, &snapshot).unwrap();
        assert!(matches!(SomNet::from_bytes(&bytes_zero_lambda), Err(NetError::InvalidFormat(_))));

        let mut snapshot: SomSnapshot = NetFormat::decode(&bytes, NetKind::Som).unwrap();
        snapshot.conscience_rate = 1.0;
        let bytes_full_conscience = NetFormat::encode(NetKind::Som, &snapshot).unwrap();
        assert!(matches!(SomNet::from_bytes(&bytes_full_conscience), Err(NetError::InvalidFormat(_))));

        assert!(SomNet::from_bytes(&bytes).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(BpNet::load(dir.path().join("absent.bin")), Err(NetError::Io(_))));
    }
}
